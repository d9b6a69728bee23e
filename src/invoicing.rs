//! Invoice creation.
//!
//! Reads the customer and price live from the provider, picks discounts, then
//! creates the invoice, its line item, and sends it. The first failing step
//! aborts the workflow. Earlier steps are not undone, so a line item or send
//! failure leaves a draft invoice on the provider; the error carries its ID.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::is_independent;
use crate::discount::DiscountPolicy;
use crate::provider::{
    BillingProvider, CollectionMethod, CreateInvoiceItemRequest, CreateInvoiceRequest,
    ProviderError,
};

/// Days a sent invoice stays payable.
pub const DAYS_UNTIL_DUE: u32 = 30;

/// Currency used when a price reports none.
pub const FALLBACK_CURRENCY: &str = "usd";

/// An invoice to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRequest {
    pub customer_id: String,
    pub price_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub description: String,
}

/// The step of the workflow that failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvoicingError {
    #[error("Failed to look up customer {customer_id}: {source}")]
    CustomerLookup {
        customer_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("Failed to look up price {price_id}: {source}")]
    PriceLookup {
        price_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("Failed to create invoice: {source}")]
    InvoiceCreation {
        #[source]
        source: ProviderError,
    },

    #[error("Failed to add line item to invoice {invoice_id}: {source}")]
    LineItemCreation {
        invoice_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("Failed to send invoice {invoice_id}: {source}")]
    InvoiceSend {
        invoice_id: String,
        #[source]
        source: ProviderError,
    },
}

impl InvoicingError {
    /// The provider error behind this failure.
    pub fn provider_error(&self) -> &ProviderError {
        match self {
            Self::CustomerLookup { source, .. }
            | Self::PriceLookup { source, .. }
            | Self::InvoiceCreation { source }
            | Self::LineItemCreation { source, .. }
            | Self::InvoiceSend { source, .. } => source,
        }
    }

    /// The invoice left on the provider by a partial run, if any.
    pub fn orphaned_invoice(&self) -> Option<&str> {
        match self {
            Self::LineItemCreation { invoice_id, .. } | Self::InvoiceSend { invoice_id, .. } => {
                Some(invoice_id)
            }
            _ => None,
        }
    }
}

/// Creates and sends invoices through a provider.
pub struct InvoicingWorkflow<P> {
    provider: Arc<P>,
    policy: DiscountPolicy,
}

impl<P> Clone for InvoicingWorkflow<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<P: BillingProvider> InvoicingWorkflow<P> {
    pub fn new(provider: Arc<P>, policy: DiscountPolicy) -> Self {
        Self { provider, policy }
    }

    /// Create, fill and send an invoice. Returns the sent invoice's ID.
    pub async fn create_and_send(&self, request: InvoiceRequest) -> Result<String, InvoicingError> {
        let customer = self
            .provider
            .get_customer(&request.customer_id)
            .await
            .map_err(|source| InvoicingError::CustomerLookup {
                customer_id: request.customer_id.clone(),
                source,
            })?;

        let price = self
            .provider
            .get_price(&request.price_id)
            .await
            .map_err(|source| InvoicingError::PriceLookup {
                price_id: request.price_id.clone(),
                source,
            })?;

        let discounts = self
            .policy
            .discounts_for(request.quantity, is_independent(&customer.metadata));
        tracing::debug!(
            customer_id = %customer.id,
            price_id = %price.id,
            quantity = request.quantity,
            ?discounts,
            "Creating invoice"
        );

        let invoice = self
            .provider
            .create_invoice(CreateInvoiceRequest {
                customer_id: customer.id.clone(),
                auto_advance: true,
                collection_method: CollectionMethod::SendInvoice,
                days_until_due: DAYS_UNTIL_DUE,
                description: request.description,
                discounts,
            })
            .await
            .map_err(|source| InvoicingError::InvoiceCreation { source })?;

        self.provider
            .create_invoice_item(CreateInvoiceItemRequest {
                customer_id: customer.id.clone(),
                invoice_id: invoice.id.clone(),
                currency: price
                    .currency
                    .unwrap_or_else(|| FALLBACK_CURRENCY.to_string()),
                unit_amount: price.unit_amount.unwrap_or(0),
                product_id: price.product_id,
                quantity: request.quantity,
            })
            .await
            .map_err(|source| InvoicingError::LineItemCreation {
                invoice_id: invoice.id.clone(),
                source,
            })?;

        let sent = self
            .provider
            .send_invoice(&invoice.id)
            .await
            .map_err(|source| InvoicingError::InvoiceSend {
                invoice_id: invoice.id.clone(),
                source,
            })?;

        tracing::info!(
            customer_id = %customer.id,
            invoice_id = %sent.id,
            "Invoice sent"
        );
        Ok(sent.id)
    }
}
