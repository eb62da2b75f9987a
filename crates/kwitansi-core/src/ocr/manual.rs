//! Terminal provider that defers the receipt to a human.

use async_trait::async_trait;

use super::{RecognitionProvider, Recognized};
use crate::error::ProviderError;
use crate::models::config::MANUAL_PROVIDER_ID;
use crate::models::receipt::PreprocessedImage;

/// Always answers with empty text and zero confidence.
///
/// Placed last in a provider order it guarantees the chain ends in a
/// recognizable manual-entry state instead of an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualProvider;

#[async_trait]
impl RecognitionProvider for ManualProvider {
    fn id(&self) -> &str {
        MANUAL_PROVIDER_ID
    }

    async fn recognize(&self, _image: &PreprocessedImage) -> Result<Recognized, ProviderError> {
        Ok(Recognized::new(String::new(), 0.0))
    }
}
