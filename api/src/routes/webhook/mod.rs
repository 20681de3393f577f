pub mod webhook_ack;
pub mod webhook_gitea_route;
