pub mod forge_webhook_request;
pub mod forge_webhook_response;
pub mod forge_webhook_route;
pub mod health_route;
