//! Stream accumulation performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reasoning_relay::services::{rewrite_request_body, ReasoningCache, StreamAccumulator};
use reasoning_relay::Message;
use serde_json::json;

/// Build an SSE body with reasoning and content deltas
fn create_event_stream(deltas: usize) -> Vec<u8> {
    let mut body = String::new();
    body.push_str(&format!(
        "data: {}\n\n",
        json!({"choices": [{"index": 0, "delta": {"role": "assistant", "content": ""}}]})
    ));
    for i in 0..deltas {
        let delta = if i % 2 == 0 {
            json!({"reasoning": format!("step {} ", i)})
        } else {
            json!({"content": format!("token{} ", i)})
        };
        body.push_str(&format!(
            "data: {}\n\n",
            json!({"choices": [{"index": 0, "delta": delta}]})
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body.into_bytes()
}

fn bench_accumulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("accumulate_stream");

    for deltas in [10, 100, 1000] {
        let body = create_event_stream(deltas);
        group.bench_with_input(BenchmarkId::from_parameter(deltas), &body, |b, body| {
            b.iter(|| {
                let mut accumulator = StreamAccumulator::new();
                // Network-sized chunks
                for chunk in body.chunks(512) {
                    black_box(accumulator.feed(chunk));
                }
                black_box(accumulator.finish())
            })
        });
    }

    group.finish();
}

fn bench_rewrite(c: &mut Criterion) {
    let cache = ReasoningCache::with_default_ttl();
    let mut messages = Vec::new();
    for i in 0..50 {
        let reply = json!({
            "role": "assistant",
            "content": format!("answer {}", i),
            "reasoning": format!("reasoning for turn {}", i)
        });
        if let Some(message) = Message::from_value(&reply) {
            cache.remember(&message);
        }
        messages.push(json!({"role": "user", "content": format!("question {}", i)}));
        messages.push(json!({"role": "assistant", "content": format!("answer {}", i)}));
    }
    let body = serde_json::to_vec(&json!({"model": "m", "messages": messages})).unwrap();

    c.bench_function("rewrite_request_body_50_turns", |b| {
        b.iter(|| black_box(rewrite_request_body(black_box(&body), &cache)))
    });
}

criterion_group!(benches, bench_accumulate, bench_rewrite);
criterion_main!(benches);
