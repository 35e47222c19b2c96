//! Websocket transport: connects to the exchange feed, subscribes to one
//! product's ticker channel, and forwards each text frame to the Ingress
//! stage.

use crate::error::TransportError;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

/// Builds the subscribe message sent immediately after the handshake.
fn subscribe_message(product_id: &str) -> String {
    serde_json::json!({
        "type": "subscribe",
        "product_ids": [product_id],
        "channels": ["ticker"],
    })
    .to_string()
}

/// Connects to `url`, subscribes to `product_id`'s ticker channel, and
/// invokes `on_frame` for every text frame received, until the connection
/// closes or a fatal transport error occurs.
pub async fn run_until_closed<F>(
    url: &str,
    product_id: &str,
    mut on_frame: F,
) -> Result<(), TransportError>
where
    F: FnMut(&str),
{
    let (mut stream, _response) =
        tokio_tungstenite::connect_async(url)
            .await
            .map_err(|source| TransportError::Connect {
                url: url.to_string(),
                source: Box::new(source),
            })?;

    stream
        .send(Message::Text(subscribe_message(product_id)))
        .await
        .map_err(|e| TransportError::Subscribe(Box::new(e)))?;

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => on_frame(&text),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => return Ok(()),
            Ok(_) => {}
            Err(_) => return Err(TransportError::Closed),
        }
    }

    Ok(())
}
