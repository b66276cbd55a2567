//! Product catalogue use cases.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::{
    AppError, CreateProductRequest, MutationOutcome, Product, ProductRepository,
    UpdateProductRequest,
};

pub struct ProductService {
    products: Arc<dyn ProductRepository>,
}

impl ProductService {
    #[must_use]
    pub fn new(products: Arc<dyn ProductRepository>) -> Self {
        Self { products }
    }

    #[instrument(skip(self))]
    pub async fn get_products(&self) -> Result<Vec<Product>, AppError> {
        self.products.find_all().await
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: &str) -> Result<Option<Product>, AppError> {
        self.products.find_by_id(id).await
    }

    /// # Errors
    /// `Validation` for a malformed request. A refused write is `Failed`.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_product(
        &self,
        request: &CreateProductRequest,
    ) -> Result<MutationOutcome, AppError> {
        request.validate()?;

        let description = request.description.as_deref().unwrap_or_default();
        match self
            .products
            .create(&request.name, request.price, description)
            .await
        {
            Ok(product) => {
                info!(product_id = %product.id, "Product created");
                Ok(MutationOutcome::Done)
            }
            Err(e) => {
                warn!(error = %e, "Failed to create product");
                Ok(MutationOutcome::Failed)
            }
        }
    }

    /// Writes only the fields present in `request`.
    #[instrument(skip(self, request))]
    pub async fn update_product(
        &self,
        id: &str,
        request: &UpdateProductRequest,
    ) -> Result<MutationOutcome, AppError> {
        request.validate()?;

        if self.products.find_by_id(id).await?.is_none() {
            return Ok(MutationOutcome::NotFound);
        }
        if request.is_empty() {
            return Ok(MutationOutcome::Done);
        }

        match self.products.update_fields(id, request).await {
            Ok(true) => Ok(MutationOutcome::Done),
            Ok(false) => Ok(MutationOutcome::Failed),
            Err(e) => {
                warn!(product_id = %id, error = %e, "Failed to update product");
                Ok(MutationOutcome::Failed)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: &str) -> Result<MutationOutcome, AppError> {
        if self.products.find_by_id(id).await?.is_none() {
            return Ok(MutationOutcome::NotFound);
        }

        match self.products.delete(id).await {
            Ok(true) => {
                info!(product_id = %id, "Product deleted");
                Ok(MutationOutcome::Done)
            }
            Ok(false) => Ok(MutationOutcome::Failed),
            Err(e) => {
                warn!(product_id = %id, error = %e, "Failed to delete product");
                Ok(MutationOutcome::Failed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockConfig, MockProductRepository};

    #[tokio::test]
    async fn test_create_and_list() {
        let products = Arc::new(MockProductRepository::new());
        let service = ProductService::new(products.clone());

        let outcome = service
            .create_product(&CreateProductRequest::new("Keyboard", 49.5))
            .await
            .unwrap();

        assert_eq!(outcome, MutationOutcome::Done);
        let all = service.get_products().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Keyboard");
        assert_eq!(all[0].description, "");
    }

    #[tokio::test]
    async fn test_negative_price_is_rejected() {
        let service = ProductService::new(Arc::new(MockProductRepository::new()));

        let err = service
            .create_product(&CreateProductRequest::new("Keyboard", -1.0))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_store_failure_is_sentinel() {
        let service = ProductService::new(Arc::new(MockProductRepository::with_config(
            MockConfig::failing_writes(),
        )));

        let outcome = service
            .create_product(&CreateProductRequest::new("Keyboard", 10.0))
            .await
            .unwrap();

        assert_eq!(outcome, MutationOutcome::Failed);
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let products = Arc::new(MockProductRepository::new());
        let id = products.seed("Keyboard", 49.5, "mechanical");
        let service = ProductService::new(products.clone());

        let outcome = service
            .update_product(
                &id,
                &UpdateProductRequest {
                    price: Some(39.0),
                    ..UpdateProductRequest::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome, MutationOutcome::Done);
        let product = service.get_product(&id).await.unwrap().unwrap();
        assert_eq!(product.name, "Keyboard");
        assert_eq!(product.price, 39.0);
        assert_eq!(product.description, "mechanical");
    }

    #[tokio::test]
    async fn test_missing_product_is_not_found() {
        let service = ProductService::new(Arc::new(MockProductRepository::new()));

        assert!(service.get_product("missing").await.unwrap().is_none());
        assert_eq!(
            service
                .update_product("missing", &UpdateProductRequest::default())
                .await
                .unwrap(),
            MutationOutcome::NotFound
        );
        assert_eq!(
            service.delete_product("missing").await.unwrap(),
            MutationOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_delete_removes_product() {
        let products = Arc::new(MockProductRepository::new());
        let id = products.seed("Mouse", 15.0, "");
        let service = ProductService::new(products);

        assert!(service.delete_product(&id).await.unwrap().is_done());
        assert!(service.get_product(&id).await.unwrap().is_none());
    }
}
