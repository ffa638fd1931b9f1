//! Render queue (C6) and progress bus (C2) integration tests.

use std::time::Duration;

/// Test queue connectivity and depth probe.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_queue_connection() {
    dotenvy::dotenv().ok();

    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let queue = vrender_worker::RenderQueue::new(&redis_url).expect("Failed to create queue");
    queue.ensure_group().await.expect("Failed to ensure consumer group");

    let len = queue.len().await.expect("Failed to get queue length");
    println!("Queue length: {}", len);
}

/// Test job enqueue, claim, and acknowledge cycle.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_job_enqueue_claim_ack() {
    use vrender_models::job::RenderJob;
    use vrender_models::plan::UserTier;
    use vrender_models::render_request::{ExportPreset, RenderRequest};

    dotenvy::dotenv().ok();

    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let queue = vrender_worker::RenderQueue::new(&redis_url).expect("Failed to create queue");
    queue.ensure_group().await.expect("Failed to ensure consumer group");

    let request = RenderRequest {
        project_id: "integration-test-project".to_string(),
        scenes: vec![],
        audio_ref: "integration-test-project/narration.mp3".to_string(),
        subtitles_ref: None,
        music_ref: None,
        target_width: 1080,
        target_height: 1920,
        export_preset: ExportPreset::Tiktok,
        job_id: None,
        force: false,
        published: true,
        user_tier: UserTier::Free,
        no_subtitles: false,
    };
    let job = RenderJob::new("test_user_123", request);
    let job_id = job.id.clone();

    let enqueued = queue.enqueue(&job).await.expect("Failed to enqueue");
    assert!(enqueued);

    let consumer_name = "test-consumer";
    let claimed = queue
        .claim_next(consumer_name, Duration::from_millis(1000))
        .await
        .expect("Failed to claim")
        .expect("Expected a queued job");

    assert_eq!(claimed.job.id, job_id);

    queue.ack(&claimed.message_id).await.expect("Failed to ack");
    println!("Job {} acknowledged", job_id);
}

/// Test dead-letter handling.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_dead_letter() {
    use vrender_models::job::RenderJob;
    use vrender_models::plan::UserTier;
    use vrender_models::render_request::{ExportPreset, RenderRequest};

    dotenvy::dotenv().ok();

    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let queue = vrender_worker::RenderQueue::new(&redis_url).expect("Failed to create queue");
    queue.ensure_group().await.expect("Failed to ensure consumer group");

    let request = RenderRequest {
        project_id: "integration-test-dlq-project".to_string(),
        scenes: vec![],
        audio_ref: "integration-test-dlq-project/narration.mp3".to_string(),
        subtitles_ref: None,
        music_ref: None,
        target_width: 1080,
        target_height: 1920,
        export_preset: ExportPreset::Tiktok,
        job_id: None,
        force: false,
        published: true,
        user_tier: UserTier::Free,
        no_subtitles: false,
    };
    let job = RenderJob::new("test_dlq_user", request);

    queue.enqueue(&job).await.expect("Failed to enqueue");

    let claimed = queue
        .claim_next("test-dlq-consumer", Duration::from_millis(1000))
        .await
        .expect("Failed to claim")
        .expect("Expected a queued job");

    queue.dead_letter(&claimed, "integration test failure").await.expect("Failed to move to DLQ");
    println!("Job {} moved to DLQ", claimed.job.id);
}

/// Test progress channel pub/sub.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_progress_channel() {
    use vrender_models::ProgressUpdate;
    use vrender_progress::{ProgressBus, ProgressEvent};

    dotenvy::dotenv().ok();

    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let progress = ProgressBus::new(&redis_url).expect("Failed to create progress bus");

    let job_id = uuid::Uuid::new_v4().to_string();

    let progress_clone = progress.clone();
    let job_id_clone = job_id.clone();
    let subscriber = tokio::spawn(async move {
        let mut rx = progress_clone.subscribe(&job_id_clone).await.expect("Failed to subscribe");
        let mut events = Vec::new();

        let _ = tokio::time::timeout(Duration::from_secs(2), async {
            while let Some(event) = rx.recv().await {
                let is_update = matches!(event, ProgressEvent::Update(_));
                events.push(event);
                if is_update && events.len() >= 2 {
                    break;
                }
            }
        })
        .await;

        events
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    progress.publish(&job_id, ProgressUpdate::new().percent(10).stage("init")).await.ok();
    progress.publish(&job_id, ProgressUpdate::new().percent(50).stage("clip_phase")).await.ok();

    let events = subscriber.await.expect("Subscriber task failed");
    println!("Received {} events", events.len());
    assert!(!events.is_empty());
}
