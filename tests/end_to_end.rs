//! Connected end-to-end test across ICC and the Worker Runtime: submit a
//! task through ICC's public API, hand the resulting envelope to a real
//! worker the way the dispatcher would (without going through the Task
//! Queue or Service Registry, which this test does not stand up), and
//! confirm the worker's result callback drives the task to SUCCESS on
//! ICC's side.
//!
//! Requires: `--features test-services` and a reachable Redis + RabbitMQ.

#![cfg(feature = "test-services")]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::net::TcpListener;

use taskforge_icc::state::AppState as IccAppState;
use taskforge_shared::clients::os::ObjectStore;
use taskforge_shared::clients::tq::MessageBroker;
use taskforge_shared::clients::tss::TaskStateStore;
use taskforge_shared::config::TaskforgeConfig;
use taskforge_shared::models::{CallbackConfig, TaskEnvelope};
use taskforge_worker::registry::build_registry;
use taskforge_worker::runtime::WorkerRuntime;
use taskforge_worker::state::AppState as WorkerAppState;

async fn bind_local() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, format!("http://127.0.0.1:{port}"))
}

#[tokio::test]
async fn submit_dispatch_to_worker_and_complete() {
    let (icc_listener, icc_url) = bind_local().await;

    let mut config = TaskforgeConfig::load().expect("config loads");
    config.icc.url = icc_url.clone();
    let config = Arc::new(config);

    let tss = TaskStateStore::connect(&format!(
        "redis://{}:{}/{}",
        config.redis.host, config.redis.port, config.redis.db
    ))
    .await
    .expect("redis reachable");

    let broker = MessageBroker::connect(&config.rabbitmq.amqp_url())
        .await
        .expect("rabbitmq reachable");
    let tq = Arc::new(broker.task_queue().await.expect("task queue declares"));
    let log_bus = Arc::new(broker.log_bus().await.expect("log bus declares"));
    let object_store = Arc::new(
        ObjectStore::connect(
            &config.minio.endpoint,
            "us-east-1",
            &config.minio.access_key,
            &config.minio.secret_key,
            &config.minio.bucket_inputs,
        )
        .await
        .expect("object store client constructs"),
    );

    let icc_state = IccAppState {
        config: config.clone(),
        tss: tss.clone(),
        tq,
        log_bus: log_bus.clone(),
        object_store,
    };
    let icc_app = taskforge_icc::build_router(icc_state.clone());
    tokio::spawn(async move {
        axum::serve(icc_listener, icc_app).await.unwrap();
    });

    let (worker_listener, worker_url) = bind_local().await;
    let worker_registry = build_registry();
    let worker_runtime = WorkerRuntime::start(worker_registry, log_bus, "worker-e2e-test".to_string());
    let worker_state = WorkerAppState {
        config: config.clone(),
        log_bus: Arc::new(broker.log_bus().await.expect("log bus declares")),
        runtime: worker_runtime,
    };
    let worker_app = taskforge_worker::build_router(worker_state);
    tokio::spawn(async move {
        axum::serve(worker_listener, worker_app).await.unwrap();
    });

    // give both listeners a moment to start accepting
    tokio::time::sleep(Duration::from_millis(50)).await;

    let http = reqwest::Client::new();
    let submit_body = json!({
        "task_type": "echo",
        "model_spec": {"name": "echo"},
        "payload": {"prompt": "hello from the e2e test"},
    });
    let submit_response = http
        .post(format!("{icc_url}/api/v1/tasks_json"))
        .json(&submit_body)
        .send()
        .await
        .unwrap();
    assert_eq!(submit_response.status(), 201);
    let created: serde_json::Value = submit_response.json().await.unwrap();
    let task_id = created["task_id"].as_str().unwrap().to_string();

    // Simulate the dispatcher's hand-off: fetch the stored record and
    // forward the same envelope shape a real dispatch would build.
    let record = tss.get_task(&task_id).await.unwrap().expect("record exists");
    let internal_callback = CallbackConfig {
        url: format!("{icc_url}/api/v1/internal/task-callback"),
        headers: Some(
            [(
                "Authorization".to_string(),
                format!("Bearer {}", config.icc.internal_key),
            )]
            .into_iter()
            .collect(),
        ),
    };
    let envelope = TaskEnvelope::from_record(&record, internal_callback);

    let dispatch_response = http
        .post(format!("{worker_url}/api/v1/tasks"))
        .json(&envelope)
        .send()
        .await
        .unwrap();
    assert_eq!(dispatch_response.status(), 200);

    // The worker runs the echo adapter and posts its callback
    // asynchronously; poll until ICC records the terminal state.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(record) = tss.get_task(&task_id).await.unwrap() {
            if record.status == taskforge_shared::models::TaskStatus::Success {
                assert_eq!(record.result.unwrap()["echoed"]["prompt"], "hello from the e2e test");
                break;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("task did not reach SUCCESS within the deadline");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
