mod me;

use async_graphql::{
    Context, EmptyMutation, EmptySubscription, ErrorExtensions, Object, Schema, SimpleObject,
};
use platform_api::ApiError;
use platform_authn::Resolution;
use platform_authz::{Grade, decide};
use serde::Serialize;
use tracing::instrument;

pub use me::{AccessPayload, MePayload};

pub type SchemaType = Schema<QueryRoot, EmptyMutation, EmptySubscription>;

/// Caller resolution attached to each GraphQL request.
#[derive(Clone, Debug, Default)]
pub struct Viewer(pub Resolution);

pub fn build_schema() -> SchemaType {
    Schema::build(QueryRoot, EmptyMutation, EmptySubscription).finish()
}

fn viewer(ctx: &Context<'_>) -> Resolution {
    ctx.data_opt::<Viewer>()
        .map(|viewer| viewer.0)
        .unwrap_or_default()
}

#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    #[instrument(name = "graphql.health", skip_all)]
    async fn health(&self) -> HealthPayload {
        HealthPayload { ok: true }
    }

    #[instrument(name = "graphql.me", skip_all)]
    async fn me(&self, ctx: &Context<'_>) -> Option<MePayload> {
        MePayload::from_resolution(&viewer(ctx))
    }

    /// Decision the grade gate would make for the caller at `grade`.
    #[instrument(name = "graphql.access", skip(self, ctx))]
    async fn access(&self, ctx: &Context<'_>, grade: i32) -> async_graphql::Result<AccessPayload> {
        let grade = Grade::new(i64::from(grade)).map_err(|err| ApiError::from(err).extend())?;
        let resolution = viewer(ctx);
        let decision = decide(resolution.role_state(), &resolution.profile(), grade);
        Ok(decision.into())
    }

    #[instrument(name = "graphql.version", skip_all)]
    async fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}

#[derive(Clone, Debug, SimpleObject, Serialize)]
pub struct HealthPayload {
    pub ok: bool,
}
