use std::time::Duration;

use tokio::sync::watch;

/// How long to hold off before the first identity lookup after mount.
///
/// Sessions written by the identity provider can take a moment to become
/// readable right after sign-in. `Signal` waits for the provider to say so;
/// `Delay` is the fixed wait used when no signal exists.
#[derive(Clone, Debug, Default)]
pub enum SessionReadiness {
    #[default]
    Immediate,
    Delay(Duration),
    Signal(watch::Receiver<bool>),
}

impl SessionReadiness {
    pub fn from_millis(millis: u64) -> Self {
        if millis == 0 {
            SessionReadiness::Immediate
        } else {
            SessionReadiness::Delay(Duration::from_millis(millis))
        }
    }

    pub async fn wait(&self) {
        match self {
            SessionReadiness::Immediate => {}
            SessionReadiness::Delay(duration) => tokio::time::sleep(*duration).await,
            SessionReadiness::Signal(rx) => {
                let mut rx = rx.clone();
                // A dropped sender means nobody will ever flip it; proceed.
                let _ = rx.wait_for(|ready| *ready).await;
            }
        }
    }
}
