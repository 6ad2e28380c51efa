use libris_core::Library;

/// State shared by every request handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub library: Library,
}

impl AppState {
    #[must_use]
    pub const fn new(library: Library) -> Self {
        Self { library }
    }
}
