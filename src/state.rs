use crate::{
    config::AppConfig,
    db::DbPool,
    services::{
        catalog::CatalogService, profiles::ProfileService, stops::StopService, trips::TripService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub trips: TripService,
    pub stops: StopService,
    pub catalog: CatalogService,
    pub profiles: ProfileService,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool) -> Self {
        let catalog = CatalogService::new(db.clone());
        let trips = TripService::new(db.clone());
        let stops = StopService::new(db.clone(), catalog.clone());
        let profiles = ProfileService::new(db.clone(), config.default_currency.clone());
        Self {
            config,
            db,
            trips,
            stops,
            catalog,
            profiles,
        }
    }
}
