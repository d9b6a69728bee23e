//! Customer creation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cache::{CustomerView, META_INDEPENDENT};
use crate::provider::{BillingProvider, CreateCustomerRequest, ProviderResult};

/// A customer to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub independent: bool,
}

/// Create a customer, recording the independent flag as metadata.
///
/// The cache is not touched; a refresh picks the customer up.
pub async fn create_customer<P>(provider: &P, customer: NewCustomer) -> ProviderResult<CustomerView>
where
    P: BillingProvider + ?Sized,
{
    let metadata = HashMap::from([(
        META_INDEPENDENT.to_string(),
        customer.independent.to_string(),
    )]);

    let created = provider
        .create_customer(CreateCustomerRequest {
            name: customer.name,
            email: customer.email,
            metadata,
        })
        .await?;

    tracing::info!(customer_id = %created.id, "Customer created");
    Ok(CustomerView::from(created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockProvider, Operation};

    #[tokio::test]
    async fn test_flag_written_as_metadata() {
        let provider = MockProvider::new();

        let view = create_customer(
            &provider,
            NewCustomer {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                independent: true,
            },
        )
        .await
        .unwrap();

        assert!(view.independent);
        assert_eq!(view.name, "Ada");
        let created = provider.created_customers();
        assert_eq!(created[0].metadata[META_INDEPENDENT], "true");

        let view = create_customer(
            &provider,
            NewCustomer {
                name: "Grace".to_string(),
                email: "grace@example.com".to_string(),
                independent: false,
            },
        )
        .await
        .unwrap();
        assert!(!view.independent);
        assert_eq!(provider.created_customers()[1].metadata[META_INDEPENDENT], "false");
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let provider = MockProvider::new();
        provider.fail_on(Operation::CreateCustomer);

        let result = create_customer(
            &provider,
            NewCustomer {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                independent: false,
            },
        )
        .await;
        assert!(result.is_err());
    }
}
