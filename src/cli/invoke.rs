use std::time::Duration;

use anyhow::Context as _;
use serde_json::Value;

use super::commands::{ConnectArgs, ModifierArgs, TestArgs};
use super::session::open_engine;
use crate::mqtt::{Broker, publish};

/// Runs a code service or publishes one MQTT message against the repo's system.
pub fn run_test(connect: ConnectArgs, args: TestArgs) -> anyhow::Result<()> {
    let mut engine = open_engine(&connect, &ModifierArgs::default())?;

    match (&args.service, &args.topic) {
        (Some(service), None) => {
            let params: Value = serde_json::from_str(&args.params)
                .with_context(|| format!("-params is not valid JSON: {}", args.params))?;
            let response = engine.execute_service(service, &params)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        (None, Some(topic)) => {
            let system = &engine.context().system;
            let (host, port) = system.broker_address();
            let token = engine.store().load_meta()?.token;
            let broker = Broker {
                host,
                port,
                token,
                system_key: system.system_key.clone(),
            };
            publish(&broker, topic, args.payload.as_bytes(), Duration::from_secs(args.timeout))?;
            println!("Published {} byte(s) to '{topic}' on {}:{}", args.payload.len(), broker.host, broker.port);
            Ok(())
        }
        (Some(_), Some(_)) => anyhow::bail!("Pass either -service or -topic, not both"),
        (None, None) => anyhow::bail!("Pass -service=<name> or -topic=<topic>"),
    }
}
