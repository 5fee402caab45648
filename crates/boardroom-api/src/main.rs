// Boardroom
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use boardroom_api::{
    config::Config,
    server::ApiServer,
    state::AppState,
    store::{MemoryStore, REQUIRED_INDEXES, verify_indexes},
};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting Boardroom governance API");

    // Load configuration
    let config = Config::from_env();
    info!("Loaded configuration: bind_address={}", config.bind_address);
    config.warn_on_default_secrets();

    let store = Arc::new(MemoryStore::new());
    verify_indexes(store.as_ref(), REQUIRED_INDEXES)?;
    info!(indexes = REQUIRED_INDEXES.len(), "Store indexes verified");

    let table = config.load_role_table()?;
    let state = AppState::new(config.clone(), table, store);

    if let Some(admin_id) = &config.bootstrap_admin {
        state.principals.bootstrap_admin(admin_id).await?;
    }

    let server = ApiServer::new(&config, state)?;
    info!("Governance API starting on http://{}", server.bind_address());

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    };
    server.run(shutdown).await?;

    info!("Governance API stopped");
    Ok(())
}
