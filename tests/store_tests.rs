use comunicados::announcements::{
    AnnouncementDraft, AnnouncementError, AnnouncementPatch, AnnouncementStore, ErrorKind, Scope,
    StoreEvent,
};
use comunicados::testing::{MockAnnouncementApi, MockCall};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

const EMAIL: &str = "claudio@fucapi.br";

fn professor() -> Scope {
    Scope::Professor(EMAIL.to_string())
}

fn store_for(mock: &MockAnnouncementApi) -> AnnouncementStore {
    AnnouncementStore::new(Arc::new(mock.clone()))
}

fn draft(title: &str, body: &str) -> AnnouncementDraft {
    AnnouncementDraft::new(title, body, "Professor Claudio", EMAIL)
}

/// Blank titles or bodies never reach the network
#[tokio::test]
async fn test_blank_fields_rejected_without_request() {
    let mock = MockAnnouncementApi::new();
    let store = store_for(&mock);
    let cancel = CancellationToken::new();

    for (title, body) in [("", "x"), ("   ", "x"), ("A", ""), ("A", " \n\t "), ("", "")] {
        let err = store
            .create(&professor(), &draft(title, body), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = store
            .update(&professor(), "1", &AnnouncementPatch::new(title, body), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    assert_eq!(mock.call_count().await, 0);
    assert!(store.mirror(&professor()).await.is_empty());
}

/// create({"", "x"}) leaves an already-populated mirror alone
#[tokio::test]
async fn test_invalid_create_keeps_mirror() {
    let mock = MockAnnouncementApi::new();
    mock.seed("A", "b1", EMAIL).await;
    let store = store_for(&mock);
    let cancel = CancellationToken::new();

    let before = store.refresh(&professor(), &cancel).await.unwrap();
    mock.clear_calls().await;

    let result = store.create(&professor(), &draft("", "x"), &cancel).await;
    assert!(matches!(result, Err(AnnouncementError::Validation { .. })));
    assert_eq!(store.mirror(&professor()).await, before);
    assert_eq!(mock.call_count().await, 0);
}

#[tokio::test]
async fn test_create_then_refresh_contains_exactly_one_match() {
    let mock = MockAnnouncementApi::new();
    mock.seed("Outro", "Outro aviso", EMAIL).await;
    let store = store_for(&mock);
    let cancel = CancellationToken::new();

    let created = store
        .create(&professor(), &draft("Prova", "Prova de recuperação disponível"), &cancel)
        .await
        .unwrap();
    assert!(!created.id.is_empty());
    assert_eq!(created.author_email, EMAIL);

    let mirror = store.refresh(&professor(), &cancel).await.unwrap();
    let matches: Vec<_> = mirror
        .iter()
        .filter(|a| a.title == "Prova" && a.body == "Prova de recuperação disponível")
        .collect();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, created.id);
    assert_eq!(matches[0].published_at, created.published_at);
}

/// The store re-fetches after a create instead of trusting the response
#[tokio::test]
async fn test_create_refreshes_and_tolerates_missing_id() {
    let mock = MockAnnouncementApi::new();
    mock.set_echo_created_id(false).await;
    let store = store_for(&mock);
    let cancel = CancellationToken::new();

    let created = store
        .create(&professor(), &draft("Aula", "Sem aula amanhã"), &cancel)
        .await
        .unwrap();

    assert_eq!(created.title, "Aula");
    assert_eq!(store.mirror(&professor()).await.len(), 1);
    assert_eq!(
        mock.calls().await,
        vec![
            MockCall::Create(draft("Aula", "Sem aula amanhã")),
            MockCall::List(professor()),
        ]
    );
}

#[tokio::test]
async fn test_update_scenario() {
    let mock = MockAnnouncementApi::new();
    let seeded = mock.seed("A", "b1", EMAIL).await;
    assert_eq!(seeded.id, "1");
    let store = store_for(&mock);
    let cancel = CancellationToken::new();
    store.refresh(&professor(), &cancel).await.unwrap();

    assert_ok!(
        store
            .update(&professor(), "1", &AnnouncementPatch::new("A2", "b1"), &cancel)
            .await
    );

    let mirror = store.mirror(&professor()).await;
    assert_eq!(mirror.len(), 1);
    assert_eq!(mirror[0].id, "1");
    assert_eq!(mirror[0].title, "A2");
    assert_eq!(mirror[0].body, "b1");
    assert_eq!(mirror[0].published_at, seeded.published_at);
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let mock = MockAnnouncementApi::new();
    let store = store_for(&mock);

    let err = store
        .update(
            &professor(),
            "99",
            &AnnouncementPatch::new("A", "b"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err, AnnouncementError::not_found("99"));
}

#[tokio::test]
async fn test_delete_removes_from_refresh() {
    let mock = MockAnnouncementApi::new();
    let first = mock.seed("A", "a", EMAIL).await;
    let second = mock.seed("B", "b", EMAIL).await;
    let store = store_for(&mock);
    let cancel = CancellationToken::new();

    assert_ok!(store.delete(&professor(), &first.id, &cancel).await);

    let mirror = store.refresh(&professor(), &cancel).await.unwrap();
    assert!(mirror.iter().all(|a| a.id != first.id));
    assert!(mirror.iter().any(|a| a.id == second.id));

    let again = store.delete(&professor(), &first.id, &cancel).await;
    assert_eq!(assert_err!(again).kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_network_failure_leaves_mirror() {
    let mock = MockAnnouncementApi::new();
    mock.seed("A", "a", EMAIL).await;
    let store = store_for(&mock);
    let cancel = CancellationToken::new();
    store.refresh(&professor(), &cancel).await.unwrap();

    mock.fail_next(AnnouncementError::network("connection reset")).await;
    let err = store.refresh(&professor(), &cancel).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(store.mirror(&professor()).await.len(), 1);
}

/// A second change for the same scope is refused while the first is pending
#[tokio::test]
async fn test_overlapping_mutation_is_rejected() {
    let mock = MockAnnouncementApi::new();
    mock.set_latency(Duration::from_millis(200)).await;
    let store = store_for(&mock);

    let first = {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .create(&professor(), &draft("Um", "primeiro"), &CancellationToken::new())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(store.is_busy(&professor()));

    let second = store
        .create(&professor(), &draft("Dois", "segundo"), &CancellationToken::new())
        .await;
    assert!(matches!(second, Err(AnnouncementError::Busy { .. })));

    // Other scopes are unaffected.
    assert!(!store.is_busy(&Scope::Student));

    assert_ok!(first.await.unwrap());
    assert!(!store.is_busy(&professor()));
    assert_eq!(mock.mutation_count().await, 1);
}

#[tokio::test]
async fn test_cancelled_refresh_leaves_mirror_untouched() {
    let mock = MockAnnouncementApi::new();
    mock.seed("A", "a", EMAIL).await;
    mock.set_latency(Duration::from_millis(200)).await;
    let store = store_for(&mock);
    let cancel = CancellationToken::new();

    let pending = {
        let store = store.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { store.refresh(&professor(), &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    cancel.cancel();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(AnnouncementError::Cancelled)));
    assert!(store.mirror(&professor()).await.is_empty());
    assert!(store.last_refreshed(&professor()).await.is_none());
}

#[tokio::test]
async fn test_already_cancelled_sends_nothing() {
    let mock = MockAnnouncementApi::new();
    let store = store_for(&mock);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = store.delete(&professor(), "1", &cancel).await;
    assert!(matches!(result, Err(AnnouncementError::Cancelled)));
    assert_eq!(mock.call_count().await, 0);
    assert!(!store.is_busy(&professor()));
}

#[tokio::test]
async fn test_events_published() {
    let mock = MockAnnouncementApi::new();
    mock.seed("A", "a", EMAIL).await;
    let store = store_for(&mock);
    let mut events = store.subscribe();
    let cancel = CancellationToken::new();

    store.refresh(&professor(), &cancel).await.unwrap();
    assert_eq!(
        events.recv().await.unwrap(),
        StoreEvent::MirrorReplaced {
            scope: professor(),
            count: 1
        }
    );

    let _ = store.delete(&professor(), "42", &cancel).await;
    match events.recv().await.unwrap() {
        StoreEvent::MutationFailed { scope, kind, .. } => {
            assert_eq!(scope, professor());
            assert_eq!(kind, ErrorKind::NotFound);
        }
        other => panic!("Expected MutationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_student_scope_carries_course() {
    let mock = MockAnnouncementApi::new();
    mock.set_course(comunicados::announcements::CourseInfo {
        subject: "Cálculo 1".to_string(),
        term: "FUCAPI - 2025/1".to_string(),
    })
    .await;
    let store = store_for(&mock);

    store
        .refresh(&Scope::Student, &CancellationToken::new())
        .await
        .unwrap();

    let course = store.course_info(&Scope::Student).await.unwrap();
    assert_eq!(course.subject, "Cálculo 1");
    assert!(store.course_info(&professor()).await.is_none());
}

#[tokio::test]
async fn test_attendance_fetched_each_time() {
    let mock = MockAnnouncementApi::new();
    mock.set_attendance(24.0, 25.0).await;
    let store = store_for(&mock);
    let cancel = CancellationToken::new();

    let record = store.attendance("João Vitor Mesquita", &cancel).await.unwrap();
    assert_eq!(record.student_name, "João Vitor Mesquita");
    assert!(record.is_near_limit());

    mock.set_attendance(26.0, 25.0).await;
    let record = store.attendance("João Vitor Mesquita", &cancel).await.unwrap();
    assert!(record.is_at_risk());
    assert_eq!(mock.call_count().await, 2);
}
