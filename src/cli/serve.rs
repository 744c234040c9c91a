use std::sync::Arc;

use crate::{config, error, info, server, spotify::WebApi};

pub async fn serve(api: Arc<WebApi>) {
    info!("Serving token proxy and callback on http://{}", config::server_addr());
    if let Err(e) = server::start_api_server(config::proxy_credentials(), api).await {
        error!("Server stopped. Err: {}", e)
    }
}
