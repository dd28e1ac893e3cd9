//! Restaurant/inventory resources.
//!
//! Each resource declares its operations as an enum (one variant per OpenAPI
//! `operationId`) and a stub service that echoes the collected parameters back
//! in a 200 response. Controllers are the generic
//! [`ResourceController`](crate::service::controller::ResourceController).

use async_trait::async_trait;
use pantry_core::{DocumentError, OpenApiDocument, OperationParams, ServiceError, ServiceResponse};
use serde_json::Value;

use crate::service::controller::ResourceOperation;
use crate::service::registry::{ControllerRegistry, ResourceService, ServiceRegistry};

/// OpenAPI document shipped with the server.
pub const BUNDLED_OPENAPI: &str = include_str!("../../../api/openapi.yaml");

/// Parses [`BUNDLED_OPENAPI`].
///
/// # Errors
///
/// Returns an error only if the bundled document is malformed.
pub fn bundled_document() -> Result<OpenApiDocument, DocumentError> {
    OpenApiDocument::from_yaml_str(BUNDLED_OPENAPI)
}

// ---------------------------------------------------------------------------
// Macro for repetitive resource declarations
// ---------------------------------------------------------------------------

/// Declare a resource: its operation enum and its echoing stub service.
macro_rules! resource {
    (
        $(#[$meta:meta])*
        $resource:literal, $ops:ident, $service:ident {
            $($variant:ident => $operation_id:literal),+ $(,)?
        }
    ) => {
        #[doc = concat!("Operations of the ", $resource, " resource.")]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $ops {
            $($variant),+
        }

        impl ResourceOperation for $ops {
            const RESOURCE: &'static str = $resource;
            const CONTROLLER: &'static str = concat!($resource, "Controller");
            const SERVICE: &'static str = concat!($resource, "Service");
            const ALL: &'static [Self] = &[$(Self::$variant),+];

            fn operation_id(self) -> &'static str {
                match self {
                    $(Self::$variant => $operation_id),+
                }
            }
        }

        $(#[$meta])*
        pub struct $service;

        #[async_trait]
        impl ResourceService for $service {
            fn name(&self) -> &'static str {
                <$ops as ResourceOperation>::SERVICE
            }

            async fn handle(
                &self,
                operation_id: &'static str,
                params: OperationParams,
            ) -> Result<ServiceResponse, ServiceError> {
                Ok(echo(self.name(), operation_id, params))
            }
        }
    };
}

fn echo(service: &'static str, operation_id: &'static str, params: OperationParams) -> ServiceResponse {
    tracing::debug!(service, operation = operation_id, params = params.len(), "echo");
    ServiceResponse::success(Value::Object(params))
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

resource!(
    /// Stock on hand: ingredients and supplies.
    "Inventory", InventoryOperation, InventoryService {
        ListItems => "listInventoryItems",
        ListLowStock => "listLowStockItems",
        GetItem => "getInventoryItem",
        CreateItem => "createInventoryItem",
        UpdateItem => "updateInventoryItem",
        DeleteItem => "deleteInventoryItem",
        AdjustStock => "adjustStock",
    }
);

resource!(
    /// Vendors the restaurant buys from.
    "Suppliers", SupplierOperation, SuppliersService {
        ListSuppliers => "listSuppliers",
        GetSupplier => "getSupplier",
        CreateSupplier => "createSupplier",
        UpdateSupplier => "updateSupplier",
        DeleteSupplier => "deleteSupplier",
    }
);

resource!(
    /// Dishes offered to guests.
    "Menu", MenuOperation, MenuService {
        ListMenuItems => "listMenuItems",
        GetMenuItem => "getMenuItem",
        CreateMenuItem => "createMenuItem",
        UpdateMenuItem => "updateMenuItem",
        DeleteMenuItem => "deleteMenuItem",
    }
);

resource!(
    /// Purchase orders placed with suppliers.
    "Orders", OrderOperation, OrdersService {
        ListOrders => "listOrders",
        GetOrder => "getOrder",
        CreateOrder => "createOrder",
        UpdateOrderStatus => "updateOrderStatus",
        CancelOrder => "cancelOrder",
    }
);

/// Register every resource's controller and service.
pub fn register_all(controllers: &mut ControllerRegistry, services: &mut ServiceRegistry) {
    controllers.register_resource::<InventoryOperation>();
    controllers.register_resource::<SupplierOperation>();
    controllers.register_resource::<MenuOperation>();
    controllers.register_resource::<OrderOperation>();

    services.register(InventoryService);
    services.register(SuppliersService);
    services.register(MenuService);
    services.register(OrdersService);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
