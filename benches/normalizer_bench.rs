//! Benchmarks for decoding and normalizing broker messages
//!
//! Run with: cargo bench

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use polychaeta_relay::normalizer::{EventNormalizer, RelayEvent, TopicKind};
use polychaeta_relay::relay::{DeviceRegistry, EventSink, LatestReadingStore};
use polychaeta_relay::websocket::{ConnectionHub, HubConfig};
use std::sync::Arc;

fn reading_payload(device: usize) -> Vec<u8> {
    format!(
        r#"{{"device_id": "box-{}", "timestamp": 1700000000000, "temperature": 24.1,
        "pH": 8.1, "dissolved_oxygen": 7.9, "turbidity": 1.2, "flow_rate": 12.5,
        "co2": 410.0, "tds": 320.0, "salinity": 35.0, "blue_green_algae": 0.4}}"#,
        device
    )
    .into_bytes()
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let payload = reading_payload(7);
    let now = Utc::now();

    group.throughput(Throughput::Elements(1));
    group.bench_function("sensor_data", |b| {
        b.iter(|| RelayEvent::decode(TopicKind::SensorData, black_box(&payload), now).unwrap())
    });

    group.finish();
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    let runtime = tokio::runtime::Runtime::new().unwrap();

    for clients in [0, 10, 100] {
        let registry = Arc::new(DeviceRegistry::new());
        let readings = Arc::new(LatestReadingStore::new());
        let hub = Arc::new(ConnectionHub::new(
            HubConfig {
                queue_capacity: 1 << 20,
                ..HubConfig::default()
            },
            Arc::clone(&registry),
            Arc::clone(&readings),
        ));
        let normalizer = EventNormalizer::new(
            registry,
            readings,
            Arc::clone(&hub) as Arc<dyn EventSink>,
        );

        // Drained in the background so connections stay open
        runtime.block_on(async {
            for _ in 0..clients {
                let mut sub = hub.connect().await.unwrap();
                tokio::spawn(async move { while sub.receiver.recv().await.is_some() {} });
            }
        });

        let payloads: Vec<_> = (0..100).map(reading_payload).collect();
        group.throughput(Throughput::Elements(payloads.len() as u64));

        group.bench_function(format!("readings_to_{}_clients", clients), |b| {
            b.iter(|| {
                runtime.block_on(async {
                    for payload in &payloads {
                        normalizer
                            .handle_message(TopicKind::SensorData, black_box(payload), Utc::now())
                            .await;
                    }
                })
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_decode, bench_normalize);
criterion_main!(benches);
