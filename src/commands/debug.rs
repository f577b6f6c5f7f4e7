//! Debug command handlers.

use anyhow::anyhow;
use crossterm::style::Stylize;

use ccxt_hwmon::SyncCommander;
use ccxt_transport::{hex_dump, Endpoint, EndpointData};

use super::{with_commander, CommandResult, Context};

/// Run a read transaction on `endpoint` and return the captured payload
pub fn read_raw(commander: &SyncCommander, endpoint: Endpoint) -> anyhow::Result<EndpointData> {
    let data = commander.block_on(commander.commander().session().read_endpoint(endpoint))?;
    Ok(data)
}

/// Read an endpoint and dump the raw payload
pub fn dump(ctx: &Context, endpoint: &str) -> CommandResult {
    let endpoint: Endpoint = endpoint.parse().map_err(|e: String| anyhow!(e))?;
    with_commander(ctx, |commander| {
        let data = read_raw(commander, endpoint)?;
        println!("Endpoint {}: {} bytes", endpoint, data.received_len());
        if let Some(e) = data.trailing_close_error() {
            println!("{}", format!("close after read failed: {e}").yellow());
        }
        print!("{}", hex_dump(&data.bytes()[..data.received_len()]));
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ccxt_hwmon::ChannelLimits;
    use ccxt_transport::mock::MockController;
    use ccxt_transport::SessionConfig;

    #[test]
    fn test_read_raw_returns_endpoint_payload() {
        let mock = Arc::new(MockController::new());
        mock.connect_fans(6, &[0, 4]);
        let commander = SyncCommander::attach(
            mock.session(SessionConfig::default()),
            ChannelLimits::default(),
        )
        .unwrap();
        mock.clear_frames();

        let data = read_raw(&commander, Endpoint::FanInventory).unwrap();
        assert_eq!(data.endpoint(), Endpoint::FanInventory);
        assert!(data.trailing_close_error().is_none());
        // count, then one state per port
        assert_eq!(data.bytes()[5], 6);
        assert_eq!(data.bytes()[6], 0x07);
        assert_eq!(data.bytes()[7], 0x00);
        assert_eq!(data.bytes()[10], 0x07);
        assert_eq!(
            mock.commands(),
            vec![
                "CLOSE_ENDPOINT fan-inventory (0x1a)",
                "OPEN_ENDPOINT fan-inventory (0x1a)",
                "READ fan-inventory (0x1a)",
                "CLOSE_ENDPOINT fan-inventory (0x1a)",
            ]
        );
    }
}
