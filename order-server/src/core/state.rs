use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::auth::{DirectoryAuthorizer, JwtService, StaffAuthorizer};
use crate::bill::{BillRenderer, PlainPdfRenderer};
use crate::core::{Config, Result};
use crate::directory::{Directory, InMemoryDirectory};
use crate::orders::{OrderLifecycle, OrderStore, RedbOrderStore};
use crate::realtime::{
    NotificationBus, OpenRoomAccess, RoomAccess, RoomAccessMode, StaffTokenAccess,
};

/// Server state - shared handles to every service
///
/// Cheap to clone; every field is an `Arc` or a handle over one.
///
/// | Field | Purpose |
/// |-------|---------|
/// | config | immutable configuration |
/// | jwt_service | token validation |
/// | directory | restaurants, tables, menu items |
/// | bus | room membership and fan-out |
/// | orders | lifecycle engine (store + bus + authorizer) |
/// | room_access | join policy for the realtime gateway |
/// | renderer | bill PDF renderer |
/// | shutdown | cancelled on ctrl-c; realtime sessions close on it |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub jwt_service: Arc<JwtService>,
    pub directory: Arc<dyn Directory>,
    pub bus: NotificationBus,
    pub orders: Arc<OrderLifecycle>,
    pub room_access: Arc<dyn RoomAccess>,
    pub renderer: Arc<dyn BillRenderer>,
    pub shutdown: CancellationToken,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("config", &self.config)
            .field("orders", &self.orders)
            .field("connections", &self.bus.connection_count())
            .finish_non_exhaustive()
    }
}

impl ServerState {
    /// Open the on-disk store under `work_dir` and load the directory seed
    pub fn initialize(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.work_dir)?;

        let db_path = config.database_path();
        let store = RedbOrderStore::open(&db_path)?.with_timeout(config.storage_timeout());
        tracing::info!(path = %db_path.display(), "Order store opened");

        let directory = match &config.directory_seed {
            Some(path) => InMemoryDirectory::load(path)?,
            None => {
                tracing::warn!("DIRECTORY_SEED not set, directory is empty");
                InMemoryDirectory::new()
            }
        };

        Ok(Self::assemble(
            config.clone(),
            Arc::new(store),
            Arc::new(directory),
        ))
    }

    /// In-memory store with the given directory (tests, demos)
    pub fn in_memory(config: Config, directory: Arc<dyn Directory>) -> Result<Self> {
        let store = RedbOrderStore::open_in_memory()?.with_timeout(config.storage_timeout());
        Ok(Self::assemble(config, Arc::new(store), directory))
    }

    /// Wire services together around a store and directory
    pub fn assemble(
        config: Config,
        store: Arc<dyn OrderStore>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        let jwt_service = Arc::new(JwtService::with_config(config.jwt.clone()));
        let bus = NotificationBus::new(config.subscriber_buffer);
        let authorizer: Arc<dyn StaffAuthorizer> =
            Arc::new(DirectoryAuthorizer::new(directory.clone()));

        let room_access: Arc<dyn RoomAccess> = match config.room_access {
            RoomAccessMode::Open => Arc::new(OpenRoomAccess),
            RoomAccessMode::StaffToken => Arc::new(StaffTokenAccess::new(
                (*jwt_service).clone(),
                authorizer.clone(),
            )),
        };

        let orders = Arc::new(OrderLifecycle::new(
            store,
            bus.clone(),
            directory.clone(),
            authorizer,
            config.transition_policy(),
        ));

        tracing::info!(
            environment = %config.environment,
            transitions = ?config.transition_policy(),
            room_access = ?config.room_access,
            "Server state assembled"
        );

        Self {
            config,
            jwt_service,
            directory,
            bus,
            orders,
            room_access,
            renderer: Arc::new(PlainPdfRenderer),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn jwt_service(&self) -> &JwtService {
        &self.jwt_service
    }
}
