//! Page-level guards: the grade gate for grade-scoped content and the auth
//! wrapper for role-protected pages.

mod auth_gate;
mod navigation;
mod route_guard;
mod view;

pub use auth_gate::{AuthGate, Protected, RoleScope};
pub use navigation::{History, Navigator};
pub use route_guard::{GuardOptions, GuardSnapshot, GuardState, Rendered, RouteGuard};
pub use view::{ActionDescriptor, DenialAction, DenialView};
