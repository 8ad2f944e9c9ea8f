mod chat;
mod helpers;
mod pantry;
mod popular;
mod receipt;
mod saved;
mod session;
mod settings;
mod shopping;
mod suggest;

use anyhow::Result;

use crate::chef_client::HttpChefTransport;
use crate::config::Config;
use crate::rest_client::HttpRestTransport;
use pantry_chef_core::cache::LocalCache;
use pantry_chef_core::chef::ChefClient;
use pantry_chef_core::remote::RemoteStore;
use pantry_chef_core::sync::SyncEngine;

pub(crate) use chat::cmd_chat;
pub(crate) use pantry::{cmd_pantry_add, cmd_pantry_clear, cmd_pantry_list, cmd_pantry_remove};
pub(crate) use popular::cmd_popular;
pub(crate) use receipt::cmd_receipt;
pub(crate) use saved::{cmd_saved_list, cmd_saved_remove};
pub(crate) use session::{cmd_login, cmd_logout, cmd_whoami};
pub(crate) use settings::{cmd_onboard, cmd_settings};
pub(crate) use shopping::{
    cmd_shopping_add, cmd_shopping_check, cmd_shopping_clear_checked, cmd_shopping_list,
    cmd_shopping_remove,
};
pub(crate) use suggest::cmd_suggest;

pub(crate) type Engine = SyncEngine<HttpRestTransport>;
pub(crate) type Chef = ChefClient<HttpChefTransport>;

/// Open the local cache and re-establish the last session from it. No
/// remote call is made here.
pub(crate) fn open_engine(config: &Config) -> Result<Engine> {
    let cache = LocalCache::open(&config.db_path)?;
    let remote = config
        .store
        .as_ref()
        .map(HttpRestTransport::new)
        .transpose()?
        .map(RemoteStore::new);
    let mut engine = SyncEngine::new(cache, remote);
    engine.restore_session()?;
    Ok(engine)
}

pub(crate) fn open_chef(config: &Config) -> Result<Chef> {
    let transport = HttpChefTransport::new(config.require_ai_url()?)?;
    Ok(ChefClient::new(transport))
}
