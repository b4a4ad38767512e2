//! # Integration Tests
//!
//! End-to-end flows across crates:
//! - socket feed -> decoder -> dispatcher -> uplink
//! - radio link -> gateway loop -> dispatcher
//! - settings file -> emoncms uplink against a local HTTP server

#[cfg(test)]
mod contract_tests {
    use contracts::{BufferSpec, ListenerSpec};

    #[test]
    fn test_settings_snapshot_shape() {
        let settings = config_loader::ConfigLoader::load_from_str(
            r#"{
                "gateway": {"loglevel": "debug"},
                "listeners": {"RFM2Pi": {"type": "radio", "runtime_settings": {"baseid": 15}}},
                "buffers": {"emoncms_local": {"type": "emoncms",
                    "runtime_settings": {"domain": "localhost", "apikey": "k", "period": 0}}}
            }"#,
            config_loader::ConfigFormat::Json,
        )
        .unwrap();

        assert_eq!(settings.gateway.log_level, "debug");
        assert!(matches!(
            settings.listeners["RFM2Pi"],
            ListenerSpec::Radio { .. }
        ));
        let BufferSpec::Emoncms {
            runtime_settings, ..
        } = &settings.buffers["emoncms_local"]
        else {
            panic!("expected emoncms buffer");
        };
        assert_eq!(runtime_settings.base_url(), "http://localhost");
        assert_eq!(runtime_settings.batch_size, 1);
        assert!(runtime_settings.active);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::VecDeque;
    use std::io::Write;
    use std::net::TcpStream;
    use std::time::{Duration, Instant};

    use contracts::{
        BufferSpec, DestinationConfig, FlushSettings, GatewaySettings, ListenerSpec, RadioInit,
        RadioRuntime, Reading, SendError, SocketInit, TimestampedReading, Uplink,
    };
    use config_loader::MemorySettings;
    use dispatcher::{Dispatcher, DispatcherError, FlushOutcome};
    use gateway::{ComponentFactory, Gateway};
    use ingestion::{Listener, ListenerError, MemoryLink, RadioListener, SocketListener};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Uplink replaying scripted results; accepted batches are kept
    #[derive(Debug, Default)]
    struct ScriptedUplink {
        script: VecDeque<Result<(), SendError>>,
        delivered: Vec<Reading>,
    }

    impl ScriptedUplink {
        fn failing(times: usize) -> Self {
            Self {
                script: (0..times)
                    .map(|_| Err(SendError::transport("connection refused")))
                    .collect(),
                ..Self::default()
            }
        }
    }

    impl Uplink for ScriptedUplink {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn send(&mut self, batch: &[TimestampedReading], _now: f64) -> Result<(), SendError> {
            let result = self.script.pop_front().unwrap_or(Ok(()));
            if result.is_ok() {
                self.delivered
                    .extend(batch.iter().map(|item| item.reading.clone()));
            }
            result
        }

        fn set_destination(&mut self, _destination: &DestinationConfig) {}
    }

    /// Radio listeners on in-memory links, scripted dispatchers
    #[derive(Default)]
    struct MemoryFactory {
        link: MemoryLink,
        failures: usize,
    }

    impl ComponentFactory for MemoryFactory {
        type Uplink = ScriptedUplink;

        fn open_listener(
            &mut self,
            name: &str,
            spec: &ListenerSpec,
            now: Instant,
        ) -> Result<Box<dyn Listener>, ListenerError> {
            let mut listener = RadioListener::with_link(name, self.link.clone())
                .with_settle_time(Duration::ZERO);
            listener.set(spec, now)?;
            Ok(Box::new(listener))
        }

        fn open_dispatcher(
            &mut self,
            name: &str,
            spec: &BufferSpec,
        ) -> Result<Dispatcher<ScriptedUplink>, DispatcherError> {
            Ok(Dispatcher::new(
                name,
                ScriptedUplink::failing(self.failures),
                spec.flush_settings(),
            ))
        }
    }

    fn radio_settings() -> GatewaySettings {
        let mut settings = GatewaySettings::default();
        settings.listeners.insert(
            "RFM2Pi".into(),
            ListenerSpec::Radio {
                init_settings: RadioInit::default(),
                runtime_settings: RadioRuntime {
                    baseid: Some(15),
                    ..RadioRuntime::default()
                },
            },
        );
        settings.buffers.insert(
            "local".into(),
            BufferSpec::Log {
                runtime_settings: FlushSettings::default(),
            },
        );
        settings
    }

    /// Socket feed -> plain-value decoding -> dispatcher with a destination
    /// that is down for two cycles: all three readings arrive in order.
    #[tokio::test]
    async fn test_socket_to_dispatcher_with_outage() {
        let init = SocketInit {
            bind_address: "127.0.0.1".into(),
            port: 0,
        };
        let mut listener = SocketListener::open("feed", &init).unwrap();
        let addr = listener.local_addr().unwrap();

        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(b"10 1605 144\r\n11 -5\r\n12 7 8 9\r\n").unwrap();
        drop(stream);

        let mut readings = Vec::new();
        for _ in 0..100 {
            if let Some(reading) = listener.read() {
                readings.push(reading);
            }
            if readings.len() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            readings,
            vec![
                Reading::new(10, vec![1605, 144]),
                Reading::new(11, vec![-5]),
                Reading::new(12, vec![7, 8, 9]),
            ]
        );

        let settings = FlushSettings {
            flush_period: 0.0,
            active: true,
            batch_size: 1,
        };
        let mut dispatcher = Dispatcher::new("local", ScriptedUplink::failing(2), settings);
        for reading in readings.iter().cloned() {
            assert!(dispatcher.add(reading));
        }

        let now = Instant::now();
        let mut outcomes = Vec::new();
        while dispatcher.buffered() > 0 && outcomes.len() < 10 {
            outcomes.push(dispatcher.flush(now).await);
        }

        assert!(matches!(outcomes[0], FlushOutcome::Failed(_)));
        assert!(matches!(outcomes[1], FlushOutcome::Failed(_)));
        assert_eq!(outcomes.len(), 5);
        assert!(outcomes[2..]
            .iter()
            .all(|outcome| *outcome == FlushOutcome::Sent(1)));
        assert_eq!(dispatcher.uplink().delivered, readings);

        let stats = dispatcher.stats();
        assert_eq!(stats.sent, 3);
        assert_eq!(stats.failure_count, 2);
        assert_eq!(stats.queue_len, 0);
        listener.close();
    }

    /// Bulk destination down for two cycles takes all three readings on the third
    #[tokio::test]
    async fn test_bulk_batch_after_outage() {
        let settings = FlushSettings {
            flush_period: 0.0,
            active: true,
            batch_size: 3,
        };
        let mut dispatcher = Dispatcher::new("remote", ScriptedUplink::failing(2), settings);
        for node in 1..=3 {
            assert!(dispatcher.add(Reading::new(node, vec![node * 100])));
        }

        let now = Instant::now();
        let mut outcomes = Vec::new();
        for _ in 0..3 {
            assert!(dispatcher.should_flush(now));
            outcomes.push(dispatcher.flush(now).await);
        }

        assert!(matches!(outcomes[0], FlushOutcome::Failed(_)));
        assert!(matches!(outcomes[1], FlushOutcome::Failed(_)));
        assert_eq!(outcomes[2], FlushOutcome::Sent(3));

        let nodes: Vec<i64> = dispatcher
            .uplink()
            .delivered
            .iter()
            .map(|reading| reading.node_id)
            .collect();
        assert_eq!(nodes, vec![1, 2, 3]);
        assert_eq!(dispatcher.buffered(), 0);
    }

    /// Radio bytes -> packed-byte decoding -> gateway loop -> dispatcher
    #[tokio::test]
    async fn test_radio_through_gateway_loop() {
        let factory = MemoryFactory::default();
        let link = factory.link.clone();
        let mut gateway = Gateway::new(MemorySettings::new(radio_settings()), factory);

        let start = Instant::now();
        let report = gateway.cycle(start).await;
        assert!(report.settings_changed);
        assert_eq!(gateway.registry().open_listeners(), 1);
        assert!(link.written().iter().any(|command| command == "15i"));

        link.feed(b"> starting\r\n10 69 6 144 0\r\n");

        // One line per read: the informational line yields nothing
        let report = gateway.cycle(start).await;
        assert_eq!(report.readings, 0);

        let report = gateway.cycle(start).await;
        assert_eq!(report.readings, 1);
        assert_eq!(report.requests, 1);

        let local = gateway.registry().dispatcher("local").unwrap();
        assert_eq!(
            local.uplink().delivered,
            vec![Reading::new(10, vec![1605, 144])]
        );
        assert_eq!(local.buffered(), 0);

        gateway.shutdown();
        assert_eq!(gateway.registry().open_listeners(), 0);
    }

    /// A destination that fails keeps its readings until it comes back
    #[tokio::test]
    async fn test_gateway_retries_failed_destination() {
        let factory = MemoryFactory {
            failures: 2,
            ..MemoryFactory::default()
        };
        let link = factory.link.clone();
        let mut gateway = Gateway::new(MemorySettings::new(radio_settings()), factory);

        let now = Instant::now();
        gateway.cycle(now).await;
        link.feed(b"1 1 0\r\n2 2 0\r\n3 3 0\r\n");

        for _ in 0..6 {
            gateway.cycle(now).await;
        }

        let local = gateway.registry().dispatcher("local").unwrap();
        let nodes: Vec<i64> = local
            .uplink()
            .delivered
            .iter()
            .map(|reading| reading.node_id)
            .collect();
        assert_eq!(nodes, vec![1, 2, 3]);
        assert_eq!(local.stats().failure_count, 2);
    }

    /// Settings file -> emoncms dispatcher -> local HTTP collector
    #[tokio::test]
    async fn test_emoncms_destination_from_settings() {
        let collector = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = collector.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut stream, _) = collector.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = stream.read(&mut buf).await.unwrap();
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
                .await
                .unwrap();
            stream.shutdown().await.ok();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });

        let settings = config_loader::ConfigLoader::load_from_str(
            &format!(
                r#"
[buffers.emoncms_local]
type = "emoncms"
[buffers.emoncms_local.init_settings]
timeout_secs = 5
[buffers.emoncms_local.runtime_settings]
host = "{addr}"
path = "/emoncms"
api_key = "secret"
"#
            ),
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let mut dispatcher =
            dispatcher::open_dispatcher("emoncms_local", &settings.buffers["emoncms_local"])
                .unwrap();
        assert!(dispatcher.add(Reading::new(10, vec![1605, 144])));
        assert_eq!(dispatcher.flush(Instant::now()).await, FlushOutcome::Sent(1));
        assert_eq!(dispatcher.buffered(), 0);

        let request = server.await.unwrap();
        assert!(
            request.starts_with("GET /emoncms/input/post.json?apikey=secret&time="),
            "got: {request}"
        );
        assert!(request.contains("&node=10&json="), "got: {request}");
    }
}
