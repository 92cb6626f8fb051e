use tripwise_booking::ParticipationCoordinator;
use tripwise_catalog::{TripCatalog, UserDirectory};
use tripwise_store::app_config::BusinessRules;
use tripwise_store::PersistenceGateway;

#[derive(Clone)]
pub struct AppState {
    pub catalog: TripCatalog,
    pub users: UserDirectory,
    pub coordinator: ParticipationCoordinator,
}

impl AppState {
    pub fn new(gateway: PersistenceGateway, rules: &BusinessRules) -> Self {
        let catalog = TripCatalog::new(gateway.clone())
            .with_default_advance_percentage(rules.default_advance_percentage);
        Self {
            users: UserDirectory::new(gateway),
            coordinator: ParticipationCoordinator::new(catalog.clone()),
            catalog,
        }
    }
}
