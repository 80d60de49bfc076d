use async_trait::async_trait;
use semangat_core::{CatalogHandle, GenerationError, GenerationProvider, ModelCatalog, ModelTier};
use std::sync::Mutex;

// Provider whose listing is scripted; generation is never used here
struct ListingProvider {
    listing: Mutex<Result<Vec<String>, GenerationError>>,
}

impl ListingProvider {
    fn new(listing: Result<Vec<&str>, GenerationError>) -> Self {
        Self {
            listing: Mutex::new(listing.map(|ids| ids.into_iter().map(String::from).collect())),
        }
    }

    fn set(&self, listing: Result<Vec<&str>, GenerationError>) {
        *self.listing.lock().unwrap() =
            listing.map(|ids| ids.into_iter().map(String::from).collect());
    }
}

#[async_trait]
impl GenerationProvider for ListingProvider {
    async fn list_models(&self) -> Result<Vec<String>, GenerationError> {
        self.listing.lock().unwrap().clone()
    }

    async fn generate(&self, _: &str, _: &str, _: f32) -> Result<String, GenerationError> {
        Err(GenerationError::Other("not used".into()))
    }
}

#[tokio::test]
async fn refresh_excludes_embedding_and_puts_flash_first() {
    let provider = ListingProvider::new(Ok(vec![
        "models/x-flash",
        "models/y-pro",
        "models/z-embedding",
    ]));
    let handle = CatalogHandle::new("gemini-2.0-flash");

    let catalog = handle.refresh(&provider).await;

    assert_eq!(catalog.ids(), vec!["x-flash", "y-pro"]);
    assert_eq!(catalog.models()[0].tier, ModelTier::Fast);
    assert_eq!(catalog.models()[1].tier, ModelTier::Capable);
    assert_eq!(handle.snapshot().ids(), vec!["x-flash", "y-pro"]);
}

#[tokio::test]
async fn provider_error_yields_default_catalog() {
    let provider = ListingProvider::new(Err(GenerationError::PermissionDenied("bad key".into())));
    let catalog = ModelCatalog::discover(&provider, "gemini-2.0-flash").await;

    assert_eq!(catalog.ids(), vec!["gemini-2.0-flash"]);
    assert!(catalog.is_degraded());
}

#[tokio::test]
async fn empty_or_unusable_listing_yields_default_catalog() {
    let provider = ListingProvider::new(Ok(vec![]));
    let catalog = ModelCatalog::discover(&provider, "gemini-2.0-flash").await;
    assert_eq!(catalog.len(), 1);

    provider.set(Ok(vec!["models/text-embedding-004", "models/gemini-tts"]));
    let catalog = ModelCatalog::discover(&provider, "gemini-2.0-flash").await;
    assert_eq!(catalog.ids(), vec!["gemini-2.0-flash"]);
}

#[tokio::test]
async fn repeated_refresh_carries_no_state_over() {
    let provider = ListingProvider::new(Ok(vec!["models/a-flash", "models/b-pro"]));
    let handle = CatalogHandle::new("gemini-2.0-flash");
    let first = handle.refresh(&provider).await;

    provider.set(Ok(vec!["models/c-pro"]));
    let second = handle.refresh(&provider).await;

    // earlier snapshot is untouched, current one is rebuilt from scratch
    assert_eq!(first.ids(), vec!["a-flash", "b-pro"]);
    assert_eq!(second.ids(), vec!["c-pro"]);
    assert_eq!(handle.snapshot().ids(), vec!["c-pro"]);

    provider.set(Err(GenerationError::Other("network down".into())));
    handle.refresh(&provider).await;
    assert_eq!(handle.snapshot().ids(), vec!["gemini-2.0-flash"]);
}
