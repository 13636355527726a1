mod common;

use common::{harness, pdf};
use std::path::Path;
use taskhub::attachment::AttachmentTarget;
use taskhub::audit::{UpdateMode, UpdatePayload};
use taskhub::entity::{Project, Task};
use taskhub::{EntityKind, Error};
use uuid::Uuid;

#[tokio::test]
async fn deleting_a_project_removes_its_subtree_and_blobs() {
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
        .store_batch(&target, vec![pdf("charter.pdf")])
        .await
        .expect("store");
    h.backend
        .add_comment(EntityKind::Project, project.id, actor, "kickoff", vec![pdf("minutes.pdf")])
        .await
        .expect("comment");
    let (task, _) = h
        .task_with(project.id, None, "Build", vec![pdf("design.pdf")])
        .await;
    let (subtask, _) = h
        .task_with(project.id, Some(task.id), "Test", vec![pdf("cases.pdf")])
        .await;
    let payload = UpdatePayload::new(actor).with("name", "Alpha 2");
    h.backend
        .update::<Project>(project.id, &payload, UpdateMode::Partial)
        .await
        .expect("update");

    let deletion = h.backend.delete::<Project>(project.id).await.expect("delete");
    assert_eq!(deletion.removed.id, project.id);
    assert_eq!(deletion.storage_keys.len(), 4);
    for key in &deletion.storage_keys {
        assert!(!Path::new(key).exists(), "{key} should be unlinked");
    }
    assert_eq!(std::fs::read_dir(h.storage_root()).expect("read_dir").count(), 0);

    assert_eq!(h.backend.repository::<Project>().get(project.id).await.expect("get"), None);
    assert_eq!(h.backend.repository::<Task>().get(task.id).await.expect("get"), None);
    assert_eq!(h.backend.repository::<Task>().get(subtask.id).await.expect("get"), None);
    assert!(h
        .backend
        .audit
        .list(EntityKind::Project, project.id)
        .await
        .expect("comments")
        .is_empty());
    assert!(h
        .backend
        .attachments
        .list(EntityKind::Task, subtask.id, None)
        .await
        .expect("documents")
        .is_empty());

    let again = h.backend.delete::<Project>(project.id).await;
    assert!(matches!(again, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn deleting_a_task_keeps_its_siblings() {
    let h = harness().await;
    let project = h.project("Alpha").await;
    let (parent, _) = h.task_with(project.id, None, "Parent", vec![pdf("p.pdf")]).await;
    let (child, _) = h
        .task_with(project.id, Some(parent.id), "Child", vec![pdf("c.pdf")])
        .await;
    let (sibling, kept) = h.task_with(project.id, None, "Sibling", vec![pdf("s.pdf")]).await;

    let deletion = h.backend.delete::<Task>(parent.id).await.expect("delete");
    assert_eq!(deletion.storage_keys.len(), 2);

    assert_eq!(h.backend.repository::<Task>().get(child.id).await.expect("get"), None);
    assert!(h
        .backend
        .repository::<Task>()
        .get(sibling.id)
        .await
        .expect("get")
        .is_some());
    assert!(h
        .backend
        .repository::<Project>()
        .get(project.id)
        .await
        .expect("get")
        .is_some());
    assert!(Path::new(&kept[0].storage_key).is_file());
    assert_eq!(std::fs::read_dir(h.storage_root()).expect("read_dir").count(), 1);
}

#[tokio::test]
async fn user_comments_take_their_attachments_with_them() {
    let h = harness().await;
    let project = h.project("Alpha").await;
    let task = h.task(project.id, None, "Build").await;
    let actor = Uuid::new_v4();

    let (comment, attached) = h
        .backend
        .add_comment(EntityKind::Task, task.id, actor, "draft", vec![pdf("draft.pdf")])
        .await
        .expect("comment");

    let edited = h
        .backend
        .audit
        .update_user_comment(EntityKind::Task, task.id, comment.id, "final")
        .await
        .expect("edit");
    assert_eq!(edited.data["message"], "final");
    assert_eq!(edited.create_date, comment.create_date);

    let removed = h
        .backend
        .delete_comment(EntityKind::Task, task.id, comment.id)
        .await
        .expect("delete");
    assert_eq!(removed.id, comment.id);
    assert!(!Path::new(&attached[0].storage_key).exists());
    assert!(h
        .backend
        .attachments
        .list(EntityKind::Task, task.id, None)
        .await
        .expect("documents")
        .is_empty());
}

#[tokio::test]
async fn system_records_cannot_be_edited_or_deleted() {
    let h = harness().await;
    let project = h.project("Alpha").await;
    let payload = UpdatePayload::new(Uuid::new_v4()).with("name", "Beta");
    let outcome = h
        .backend
        .update::<Project>(project.id, &payload, UpdateMode::Partial)
        .await
        .expect("update");
    let record = &outcome.records[0];

    let edit = h
        .backend
        .audit
        .update_user_comment(EntityKind::Project, project.id, record.id, "rewritten")
        .await;
    assert!(matches!(edit, Err(Error::NotFound(_))));

    let delete = h
        .backend
        .delete_comment(EntityKind::Project, project.id, record.id)
        .await;
    assert!(matches!(delete, Err(Error::NotFound(_))));

    let trail = h
        .backend
        .audit
        .list(EntityKind::Project, project.id)
        .await
        .expect("list");
    assert_eq!(trail, outcome.records);
}

#[tokio::test]
async fn creating_a_task_under_a_foreign_parent_fails() {
    let h = harness().await;
    let alpha = h.project("Alpha").await;
    let beta = h.project("Beta").await;
    let parent = h.task(alpha.id, None, "Parent").await;

    let result = h
        .backend
        .create_task(
            &taskhub::entity::NewTask {
                name: "Stray".to_string(),
                description: None,
                project_id: beta.id,
                parent_task_id: Some(parent.id),
                creator_id: Uuid::new_v4(),
                executor_id: None,
                completion_date: None,
            },
            Vec::new(),
        )
        .await;
    assert!(matches!(result, Err(Error::NotFound(_))));

    let listed = Task::list(h.backend.db.pool(), alpha.id, Some(parent.id))
        .await
        .expect("list");
    assert!(listed.is_empty());
    let top = Task::list(h.backend.db.pool(), alpha.id, None).await.expect("list");
    assert_eq!(top, vec![parent]);
}
