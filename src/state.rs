use crate::services::trips::TripService;

#[derive(Clone)]
pub struct AppState {
    pub trips: TripService,
}

impl AppState {
    pub fn new(trips: TripService) -> Self {
        Self { trips }
    }
}
