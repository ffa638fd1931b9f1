//! Blob store (C1) integration tests.

/// Test blob store connectivity.
#[tokio::test]
#[ignore = "requires blob store credentials"]
async fn test_storage_connection() {
    dotenvy::dotenv().ok();

    let client = vrender_storage::BlobStore::from_env()
        .await
        .expect("Failed to create blob store client");

    client
        .check_connectivity()
        .await
        .expect("Failed to check blob store connectivity");

    println!("Blob store connectivity check passed");
}

/// Test presigned URL generation.
#[tokio::test]
#[ignore = "requires blob store credentials"]
async fn test_presigned_url() {
    use vrender_storage::INTERNAL_URL_TTL;

    dotenvy::dotenv().ok();

    let client = vrender_storage::BlobStore::from_env()
        .await
        .expect("Failed to create blob store client");

    let url = client
        .signed_url("integration-test/probe.mp4", INTERNAL_URL_TTL)
        .await
        .expect("Failed to generate presigned URL");

    println!("Presigned URL: {}", url);
    assert!(url.contains("X-Amz-Signature"));
}

/// Test upload/exists/download/delete cycle using the §6 blob key helpers.
#[tokio::test]
#[ignore = "requires blob store credentials"]
async fn test_upload_download_delete() {
    use vrender_storage::keys::scene_image_key;

    dotenvy::dotenv().ok();

    let client = vrender_storage::BlobStore::from_env()
        .await
        .expect("Failed to create blob store client");

    let key = scene_image_key("integration-test-project", 0, "final");

    client
        .upload_bytes(b"integration test content".to_vec(), &key, "image/jpeg")
        .await
        .expect("Failed to upload bytes");

    assert!(client.exists(&key).await.expect("Failed to check existence"));

    let downloaded = client.download_bytes(&key).await.expect("Failed to download");
    assert_eq!(downloaded, b"integration test content");

    client.delete_object(&key).await.expect("Failed to delete object");
    assert!(!client.exists(&key).await.expect("Failed to check existence after delete"));
}
