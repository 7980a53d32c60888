// ==========================================
// 排序号管理集成测试
// ==========================================
// 测试目标: 拖拽移动、追加、删除后阶段内排序号始终连续
// ==========================================

mod test_helpers;

use futures::future::{join, join_all};
use pipeline_crm::domain::lead::{MoveLeadRequest, NewLead};
use pipeline_crm::logging;
use pipeline_crm::repository::{LeadStore, RepositoryError};

fn move_request(lead_id: &str, stage_id: &str, position: i64) -> MoveLeadRequest {
    MoveLeadRequest {
        lead_id: lead_id.to_string(),
        target_stage_id: stage_id.to_string(),
        target_position: position,
    }
}

#[tokio::test]
async fn test_drag_last_to_first_within_stage() {
    logging::init_test();
    let (_tmp, db_path) = test_helpers::create_test_db().unwrap();
    let manager = test_helpers::build_manager(&db_path);
    let qualified = test_helpers::stage_id(&db_path, "Qualified");

    let ids = test_helpers::seed_leads(&manager, &qualified, &["A", "B", "C"]).await;

    let moved = manager
        .move_lead(&move_request(&ids[2], &qualified, 0))
        .await
        .unwrap();
    assert_eq!(moved.position_index, 0);

    let layout = test_helpers::stage_layout(&db_path, &qualified);
    assert_eq!(
        layout,
        vec![
            (ids[2].clone(), 0),
            (ids[0].clone(), 1),
            (ids[1].clone(), 2),
        ]
    );
}

#[tokio::test]
async fn test_move_across_stages_keeps_both_contiguous() {
    let (_tmp, db_path) = test_helpers::create_test_db().unwrap();
    let manager = test_helpers::build_manager(&db_path);
    let stage_a = test_helpers::stage_id(&db_path, "New");
    let stage_b = test_helpers::stage_id(&db_path, "Contacted");

    let a_ids = test_helpers::seed_leads(&manager, &stage_a, &["A0", "A1", "A2"]).await;
    let b_ids = test_helpers::seed_leads(&manager, &stage_b, &["B0", "B1"]).await;

    let moved = manager
        .move_lead(&move_request(&a_ids[1], &stage_b, 1))
        .await
        .unwrap();
    assert_eq!(moved.stage_id, stage_b);
    assert_eq!(moved.position_index, 1);

    assert_eq!(
        test_helpers::stage_layout(&db_path, &stage_a),
        vec![(a_ids[0].clone(), 0), (a_ids[2].clone(), 1)]
    );
    assert_eq!(
        test_helpers::stage_layout(&db_path, &stage_b),
        vec![
            (b_ids[0].clone(), 0),
            (a_ids[1].clone(), 1),
            (b_ids[1].clone(), 2),
        ]
    );
}

#[tokio::test]
async fn test_out_of_range_position_is_clamped() {
    let (_tmp, db_path) = test_helpers::create_test_db().unwrap();
    let manager = test_helpers::build_manager(&db_path);
    let stage_a = test_helpers::stage_id(&db_path, "New");
    let stage_b = test_helpers::stage_id(&db_path, "Won");

    let a_ids = test_helpers::seed_leads(&manager, &stage_a, &["A0", "A1"]).await;
    test_helpers::seed_leads(&manager, &stage_b, &["B0"]).await;

    let to_end = manager
        .move_lead(&move_request(&a_ids[0], &stage_b, 99))
        .await
        .unwrap();
    assert_eq!(to_end.position_index, 1);

    let to_front = manager
        .move_lead(&move_request(&a_ids[1], &stage_b, -5))
        .await
        .unwrap();
    assert_eq!(to_front.position_index, 0);

    test_helpers::assert_contiguous(&db_path, &stage_a);
    test_helpers::assert_contiguous(&db_path, &stage_b);
    assert!(test_helpers::stage_positions(&db_path, &stage_a).is_empty());
}

#[tokio::test]
async fn test_repeated_move_is_idempotent() {
    let (_tmp, db_path) = test_helpers::create_test_db().unwrap();
    let manager = test_helpers::build_manager(&db_path);
    let stage = test_helpers::stage_id(&db_path, "Proposal");

    let ids = test_helpers::seed_leads(&manager, &stage, &["A", "B", "C", "D"]).await;

    let request = move_request(&ids[0], &stage, 2);
    let first = manager.move_lead(&request).await.unwrap();
    let layout_after_first = test_helpers::stage_layout(&db_path, &stage);

    let second = manager.move_lead(&request).await.unwrap();
    assert_eq!(first.position_index, second.position_index);
    assert_eq!(first.updated_at, second.updated_at);
    assert_eq!(test_helpers::stage_layout(&db_path, &stage), layout_after_first);
}

#[tokio::test]
async fn test_move_missing_entities_changes_nothing() {
    let (_tmp, db_path) = test_helpers::create_test_db().unwrap();
    let manager = test_helpers::build_manager(&db_path);
    let stage = test_helpers::stage_id(&db_path, "New");

    let ids = test_helpers::seed_leads(&manager, &stage, &["A", "B"]).await;
    let before = test_helpers::stage_layout(&db_path, &stage);

    let missing_lead = manager
        .move_lead(&move_request("no-such-lead", &stage, 0))
        .await;
    assert!(matches!(missing_lead, Err(RepositoryError::NotFound { .. })));

    let missing_stage = manager
        .move_lead(&move_request(&ids[1], "no-such-stage", 0))
        .await;
    assert!(matches!(missing_stage, Err(RepositoryError::NotFound { .. })));

    assert_eq!(test_helpers::stage_layout(&db_path, &stage), before);
}

#[tokio::test]
async fn test_delete_closes_gap() {
    let (_tmp, db_path) = test_helpers::create_test_db().unwrap();
    let manager = test_helpers::build_manager(&db_path);
    let stage = test_helpers::stage_id(&db_path, "New");

    let ids = test_helpers::seed_leads(&manager, &stage, &["A", "B", "C", "D"]).await;
    let deleted = manager.delete_lead(&ids[1]).await.unwrap();
    assert_eq!(deleted.position_index, 1);

    assert_eq!(
        test_helpers::stage_layout(&db_path, &stage),
        vec![
            (ids[0].clone(), 0),
            (ids[2].clone(), 1),
            (ids[3].clone(), 2),
        ]
    );

    // 新建继续追加到末尾
    let appended = manager
        .create_lead(&stage, NewLead::with_contact("E"))
        .await
        .unwrap();
    assert_eq!(appended.position_index, 3);
}

#[tokio::test]
async fn test_bulk_append_after_existing() {
    let (_tmp, db_path) = test_helpers::create_test_db().unwrap();
    let manager = test_helpers::build_manager(&db_path);
    let stage = test_helpers::stage_id(&db_path, "Contacted");

    test_helpers::seed_leads(&manager, &stage, &["A", "B"]).await;
    let inserted = manager
        .append_leads(
            &stage,
            vec![NewLead::with_contact("C"), NewLead::with_contact("D")],
        )
        .await
        .unwrap();

    let positions: Vec<i64> = inserted.iter().map(|l| l.position_index).collect();
    assert_eq!(positions, vec![2, 3]);
    assert_eq!(inserted[0].contact_name, "C");

    let stored = manager.store().get_leads_by_stage(&stage).await.unwrap();
    assert_eq!(stored.len(), 4);
}

#[tokio::test]
async fn test_bulk_append_to_missing_stage_inserts_nothing() {
    let (_tmp, db_path) = test_helpers::create_test_db().unwrap();
    let manager = test_helpers::build_manager(&db_path);

    let result = manager
        .append_leads("no-such-stage", vec![NewLead::with_contact("A")])
        .await;
    assert!(result.is_err());
    assert!(manager.store().get_leads().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_moves_and_appends_stay_contiguous() {
    logging::init_test();
    let (_tmp, db_path) = test_helpers::create_test_db().unwrap();
    let manager = test_helpers::build_manager(&db_path);
    let stage_a = test_helpers::stage_id(&db_path, "New");
    let stage_b = test_helpers::stage_id(&db_path, "Qualified");

    let names: Vec<String> = (0..12).map(|i| format!("Lead {}", i)).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let ids = test_helpers::seed_leads(&manager, &stage_a, &name_refs).await;

    // 交错地把一半线索拖到 B 的不同位置，同时向 B 追加
    let moves = ids.iter().step_by(2).enumerate().map(|(i, id)| {
        let manager = manager.clone();
        let request = move_request(id, &stage_b, (i % 3) as i64);
        async move { manager.move_lead(&request).await.map(|_| ()) }
    });
    let appends = (0..4).map(|i| {
        let manager = manager.clone();
        let stage_b = stage_b.clone();
        async move {
            manager
                .append_leads(&stage_b, vec![NewLead::with_contact(format!("Extra {}", i))])
                .await
                .map(|_| ())
        }
    });

    let (move_results, append_results) = join(join_all(moves), join_all(appends)).await;
    assert!(move_results.iter().all(|r| r.is_ok()));
    assert!(append_results.iter().all(|r| r.is_ok()));

    test_helpers::assert_contiguous(&db_path, &stage_a);
    test_helpers::assert_contiguous(&db_path, &stage_b);
    assert_eq!(test_helpers::stage_positions(&db_path, &stage_a).len(), 6);
    assert_eq!(test_helpers::stage_positions(&db_path, &stage_b).len(), 10);

    let reports = manager.verify_all_stages().await.unwrap();
    assert!(reports.iter().all(|r| r.is_contiguous));
}

#[tokio::test]
async fn test_interleaved_concurrent_tasks_on_runtime() {
    let (_tmp, db_path) = test_helpers::create_test_db().unwrap();
    let manager = test_helpers::build_manager(&db_path);
    let stage = test_helpers::stage_id(&db_path, "Proposal");
    let ids = test_helpers::seed_leads(&manager, &stage, &["A", "B", "C", "D", "E"]).await;

    let handles: Vec<_> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let manager = manager.clone();
            let request = move_request(id, &stage, ((i * 2) % 5) as i64);
            tokio::spawn(async move { manager.move_lead(&request).await })
        })
        .collect();

    for handle in join_all(handles).await {
        assert!(handle.unwrap().is_ok());
    }
    test_helpers::assert_contiguous(&db_path, &stage);
}
