mod common;

use common::{harness, pdf, upload};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use taskhub::attachment::{AttachmentTarget, OrphanSweeper, SweepReport};
use taskhub::{EntityKind, Error};
use uuid::Uuid;

const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[tokio::test]
async fn unsupported_uploads_are_skipped() {
    let h = harness().await;
    let project = h.project("Alpha").await;
    let target = AttachmentTarget {
        kind: EntityKind::Project,
        entity_id: project.id,
        comment_id: None,
        actor_id: Uuid::new_v4(),
    };

    let stored = h
        .backend
        .attachments
        .store_batch(
            &target,
            vec![
                pdf("charter.pdf"),
                upload("notes.txt", "text/plain"),
                upload("plan.docx", DOCX),
            ],
        )
        .await
        .expect("store");

    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].name, "charter.pdf");
    assert_eq!(stored[1].name, "plan.docx");
    assert!(stored[0].storage_key.ends_with(".pdf"));
    assert!(stored[1].storage_key.ends_with(".docx"));
    for attachment in &stored {
        assert!(Path::new(&attachment.storage_key).starts_with(h.storage_root()));
        assert!(!attachment.storage_key.contains(&attachment.name));
        assert!(Path::new(&attachment.storage_key).is_file());
    }

    let files = std::fs::read_dir(h.storage_root()).expect("read_dir").count();
    assert_eq!(files, 2);

    let listed = h
        .backend
        .attachments
        .list(EntityKind::Project, project.id, None)
        .await
        .expect("list");
    assert_eq!(listed, stored);
}

#[tokio::test]
async fn removing_a_document_deletes_row_and_file() {
    let h = harness().await;
    let project = h.project("Alpha").await;
    let (task, stored) = h
        .task_with(project.id, None, "Review", vec![pdf("review.pdf")])
        .await;
    assert_eq!(stored.len(), 1);
    let document = &stored[0];
    assert_eq!(document.user_id, task.creator_id);

    let removed = h
        .backend
        .attachments
        .remove(EntityKind::Task, task.id, document.id)
        .await
        .expect("remove");
    assert_eq!(&removed, document);
    assert!(!Path::new(&document.storage_key).exists());

    let again = h
        .backend
        .attachments
        .remove(EntityKind::Task, task.id, document.id)
        .await;
    assert!(matches!(again, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn documents_are_scoped_to_their_entity() {
    let h = harness().await;
    let project = h.project("Alpha").await;
    let (task, stored) = h
        .task_with(project.id, None, "Review", vec![pdf("review.pdf")])
        .await;
    let other = h.task(project.id, None, "Other").await;

    let wrong_owner = h
        .backend
        .attachments
        .remove(EntityKind::Task, other.id, stored[0].id)
        .await;
    assert!(matches!(wrong_owner, Err(Error::NotFound(_))));

    let missing_entity = AttachmentTarget {
        kind: EntityKind::Task,
        entity_id: 4242,
        comment_id: None,
        actor_id: Uuid::new_v4(),
    };
    let result = h
        .backend
        .attachments
        .store_batch(&missing_entity, vec![pdf("a.pdf")])
        .await;
    assert!(matches!(result, Err(Error::NotFound(_))));

    let (comment, _) = h
        .backend
        .add_comment(EntityKind::Task, task.id, Uuid::new_v4(), "see attached", Vec::new())
        .await
        .expect("comment");
    let foreign_comment = AttachmentTarget {
        kind: EntityKind::Task,
        entity_id: other.id,
        comment_id: Some(comment.id),
        actor_id: Uuid::new_v4(),
    };
    let result = h
        .backend
        .attachments
        .store_batch(&foreign_comment, vec![pdf("b.pdf")])
        .await;
    assert!(matches!(result, Err(Error::NotFound(_))));

    let files = std::fs::read_dir(h.storage_root()).expect("read_dir").count();
    assert_eq!(files, 1);
}

#[tokio::test]
async fn comment_attachments_can_be_listed_separately() {
    let h = harness().await;
    let project = h.project("Alpha").await;
    let actor = Uuid::new_v4();
    let target = AttachmentTarget {
        kind: EntityKind::Project,
        entity_id: project.id,
        comment_id: None,
        actor_id: actor,
    };
    h.backend
        .attachments
        .store_batch(&target, vec![pdf("brief.pdf")])
        .await
        .expect("store");

    let (comment, attached) = h
        .backend
        .add_comment(
            EntityKind::Project,
            project.id,
            actor,
            "signed copy",
            vec![pdf("signed.pdf"), upload("photo.png", "image/png")],
        )
        .await
        .expect("comment");
    assert_eq!(attached.len(), 1);
    assert_eq!(attached[0].comment_id, Some(comment.id));

    let for_comment = h
        .backend
        .attachments
        .list(EntityKind::Project, project.id, Some(comment.id))
        .await
        .expect("list");
    assert_eq!(for_comment, attached);

    let all = h
        .backend
        .attachments
        .list(EntityKind::Project, project.id, None)
        .await
        .expect("list");
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn sweep_removes_only_unreferenced_files() {
    let h = harness().await;
    let project = h.project("Alpha").await;
    let (_, stored) = h
        .task_with(project.id, None, "Keep", vec![pdf("keep.pdf")])
        .await;
    let orphan = h.storage_root().join(format!("{}.pdf", Uuid::new_v4()));
    std::fs::write(&orphan, b"orphan").expect("write orphan");

    let patient = OrphanSweeper::new(Arc::clone(&h.backend.attachments), Duration::from_secs(3600));
    let report = patient.sweep_once().await.expect("sweep");
    assert_eq!(
        report,
        SweepReport {
            scanned: 2,
            removed: 0,
            recent: 1
        }
    );
    assert!(orphan.exists());

    let eager = OrphanSweeper::new(Arc::clone(&h.backend.attachments), Duration::ZERO);
    let report = eager.sweep_once().await.expect("sweep");
    assert_eq!(report.removed, 1);
    assert!(!orphan.exists());
    assert!(Path::new(&stored[0].storage_key).is_file());
}

#[tokio::test]
async fn failed_blob_write_creates_no_row() {
    let h = harness().await;
    let project = h.project("Alpha").await;
    let target = AttachmentTarget {
        kind: EntityKind::Project,
        entity_id: project.id,
        comment_id: None,
        actor_id: Uuid::new_v4(),
    };
    std::fs::remove_dir_all(h.storage_root()).expect("remove storage root");

    let result = h
        .backend
        .attachments
        .store_batch(&target, vec![pdf("charter.pdf")])
        .await;
    assert!(matches!(result, Err(Error::Io(_))));

    let listed = h
        .backend
        .attachments
        .list(EntityKind::Project, project.id, None)
        .await
        .expect("list");
    assert!(listed.is_empty());
}

#[tokio::test]
async fn failed_row_insert_removes_the_written_blob() {
    let h = harness().await;
    let dangling = AttachmentTarget {
        kind: EntityKind::Project,
        entity_id: 4242,
        comment_id: None,
        actor_id: Uuid::new_v4(),
    };

    let result = h
        .backend
        .attachments
        .store(&dangling, pdf("charter.pdf"))
        .await;
    assert!(matches!(result, Err(Error::Database(_))));
    assert_eq!(std::fs::read_dir(h.storage_root()).expect("read_dir").count(), 0);
}
