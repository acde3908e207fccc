//! Commands that talk to a peer.

use std::time::Duration;

use oscq_discovery::ParameterMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cli::{Cli, ValueKind};
use crate::client::{ClientState, OscClient};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Starts a client and waits until it is connected to a peer.
///
/// With `--send`/`--receive` the fixed endpoints are used, otherwise the peer
/// is discovered. A `--timeout` of zero waits until `token` is cancelled.
pub async fn connect(
    cli: &Cli,
    config: &ClientConfig,
    token: &CancellationToken,
) -> ClientResult<OscClient> {
    let filter = config.filter.to_message_filter().map_err(ClientError::Config)?;
    let client = OscClient::from_config(config)?;

    if let Some((send, receive)) = cli.direct_endpoints() {
        client.start_with_endpoints(send, receive, filter, token).await?;
        return Ok(client);
    }

    info!("Waiting for a peer");
    let waiting = client.start_and_wait(filter, token);
    let result = if cli.timeout == 0 {
        waiting.await
    } else {
        let timeout = Duration::from_secs(cli.timeout);
        tokio::time::timeout(timeout, waiting)
            .await
            .unwrap_or_else(|_| {
                Err(ClientError::Timeout(format!(
                    "no peer found within {} seconds",
                    cli.timeout
                )))
            })
    };

    let result = result.and_then(|()| match client.state() {
        ClientState::Connected => Ok(()),
        _ => Err(ClientError::Cancelled),
    });
    if let Err(e) = result {
        client.stop(&CancellationToken::new()).await;
        return Err(e);
    }
    Ok(client)
}

/// Prints everything the peer sends until `token` is cancelled.
pub async fn listen(cli: &Cli, config: &ClientConfig, token: &CancellationToken) -> ClientResult<()> {
    let client = connect(cli, config, token).await?;
    if let Some(connection) = client.connection() {
        println!("connected: {}", connection);
    }

    client.on_message_received().add(|message| async move {
        println!("{}", message);
        Ok(())
    });
    client.on_parameter_received().add(|parameter| async move {
        println!("{} = {} ({})", parameter.name(), parameter.value(), parameter.value().kind());
        Ok(())
    });
    client.on_avatar_changed().add(|parameters| async move {
        println!("avatar changed, {} parameters", parameters.len());
        print_parameters(&parameters);
        Ok(())
    });
    client.on_peer_found().add(|connection| async move {
        println!("reconnected: {}", connection);
        Ok(())
    });

    token.cancelled().await;
    debug!("Listen cancelled");
    client.stop(&CancellationToken::new()).await;
    Ok(())
}

pub async fn chat(
    cli: &Cli,
    config: &ClientConfig,
    text: &str,
    bypass_keyboard: bool,
    notify: bool,
    token: &CancellationToken,
) -> ClientResult<()> {
    let client = connect(cli, config, token).await?;
    let result = client.send_chat_message(text, bypass_keyboard, notify).await;
    client.stop(token).await;
    result
}

pub async fn param(
    cli: &Cli,
    config: &ClientConfig,
    name: &str,
    value: &str,
    kind: ValueKind,
    token: &CancellationToken,
) -> ClientResult<()> {
    let value = kind.parse(value)?;
    let client = connect(cli, config, token).await?;
    let result = client.send_parameter_change(name, value).await;
    client.stop(token).await;
    result
}

pub async fn parameters(cli: &Cli, config: &ClientConfig, token: &CancellationToken) -> ClientResult<()> {
    let client = connect(cli, config, token).await?;
    let result = client.avatar_parameters(token).await;
    client.stop(&CancellationToken::new()).await;

    let parameters = result?;
    if parameters.is_empty() {
        println!("No parameters.");
    } else {
        print_parameters(&parameters);
    }
    Ok(())
}

fn print_parameters(parameters: &ParameterMap) {
    let width = parameters.keys().map(String::len).max().unwrap_or(0);
    for (name, value) in parameters {
        println!("{:width$}  {:6}  {}", name, value.kind(), value, width = width);
    }
}
