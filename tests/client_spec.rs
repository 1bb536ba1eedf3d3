//! HTTP client tests against a server bound to an ephemeral local port.

use syllabus_track::api::{create_router_with_config, SecurityConfig};
use syllabus_track::db::Database;
use syllabus_track::mcp::{ClientError, TrackerClient};
use syllabus_track::models::*;
use syllabus_track::tracker::Tracker;

async fn spawn_server(config: SecurityConfig) -> (String, Tracker) {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    let tracker = Tracker::new(db);
    let app = create_router_with_config(tracker.clone(), config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to read address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    (format!("http://{}/api/v1", addr), tracker)
}

async fn setup() -> (TrackerClient, Tracker) {
    let (url, tracker) = spawn_server(SecurityConfig::disabled()).await;
    (TrackerClient::new(url, None), tracker)
}

mod reads {
    use super::*;

    #[tokio::test]
    async fn lists_seeded_subjects_and_exams() {
        let (client, _) = setup().await;
        assert!(client.seed().await.expect("Seed failed"));

        let subjects = client.list_subjects().await.expect("List failed");
        let exams = client.list_exams().await.expect("List failed");

        assert_eq!(subjects.len(), 4);
        assert_eq!(subjects.iter().map(|s| s.topics.len()).sum::<usize>(), 20);
        assert_eq!(exams.len(), 6);
    }

    #[tokio::test]
    async fn second_seed_reports_nothing_loaded() {
        let (client, _) = setup().await;
        assert!(client.seed().await.expect("Seed failed"));
        assert!(!client.seed().await.expect("Seed failed"));
    }
}

mod topics {
    use super::*;

    fn create_subject(tracker: &Tracker) -> Subject {
        tracker
            .create_subject(CreateSubjectInput {
                title: "Pakistan Studies".to_string(),
                color: None,
                topics: vec![],
            })
            .expect("Failed to create subject")
    }

    #[tokio::test]
    async fn add_then_toggle() {
        let (client, tracker) = setup().await;
        let subject = create_subject(&tracker);

        let topic = client
            .add_topic(
                &subject.id,
                &NewTopicInput {
                    name: "Ideology".to_string(),
                    priority: Some(Priority::High),
                    deadline: None,
                    link: None,
                },
            )
            .await
            .expect("Add failed");
        let toggled = client
            .toggle_topic(&subject.id, &topic.id)
            .await
            .expect("Toggle failed");

        assert!(toggled.is_completed);
        let stored = tracker.subject(&subject.id).expect("Missing subject");
        assert_eq!(stored.topics, vec![toggled]);
    }

    #[tokio::test]
    async fn unknown_subject_is_not_found() {
        let (client, _) = setup().await;

        let result = client.toggle_topic("missing", "t1").await;

        assert!(matches!(result, Err(ClientError::NotFound(_))));
    }

    #[tokio::test]
    async fn blank_name_is_a_bad_request() {
        let (client, tracker) = setup().await;
        let subject = create_subject(&tracker);

        let result = client
            .add_topic(
                &subject.id,
                &NewTopicInput {
                    name: " ".to_string(),
                    priority: None,
                    deadline: None,
                    link: None,
                },
            )
            .await;

        assert!(matches!(result, Err(ClientError::BadRequest(_))));
    }
}

mod auth {
    use super::*;

    #[tokio::test]
    async fn missing_key_is_unauthorized() {
        let (url, _) = spawn_server(SecurityConfig::with_api_key("secret")).await;

        let result = TrackerClient::new(url, None).list_exams().await;

        assert!(matches!(result, Err(ClientError::Unauthorized)));
    }

    #[tokio::test]
    async fn matching_key_is_accepted() {
        let (url, _) = spawn_server(SecurityConfig::with_api_key("secret")).await;

        let exams = TrackerClient::new(url, Some("secret".to_string()))
            .list_exams()
            .await
            .expect("List failed");

        assert!(exams.is_empty());
    }
}
