pub mod args;
mod setup;

pub use args::AppArgs;

use crate::web;
use anyhow::Result;

pub async fn launch() -> Result<()> {
    launch_with_args(AppArgs::from_cli()).await
}

pub async fn launch_with_args(args: AppArgs) -> Result<()> {
    let setup::PreparedApp { args, analyzer } = setup::prepare(args)?;

    web::start_server(analyzer, args.listen, args.max_body_bytes).await
}
