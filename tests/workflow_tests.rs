//! Workflow engine integration tests
//!
//! Exercises the letter lifecycle end to end against SQLite.

use std::sync::Arc;

use approval::error::AppError;
use approval::models::{Action, Actor, LetterStatus, StepStatus};
use approval::store::Store;
use approval::workflow::{NoopNotifier, Role, Route, Workflow};

mod common;

/// One actor per role of `route`, plus a Faculty Association sender
async fn actors_for(workflow: &Workflow, route: &Route) -> (Vec<Actor>, Actor) {
    let mut approvers = Vec::new();
    for (i, role) in route.roles().iter().enumerate() {
        approvers.push(
            workflow
                .create_actor(&format!("u{}", i), role.as_str())
                .await
                .unwrap(),
        );
    }
    let sender = workflow
        .create_actor("sender", "Faculty Association")
        .await
        .unwrap();
    (approvers, sender)
}

#[tokio::test]
async fn test_sequential_approvals_for_every_route_length() {
    for n in 1..=Role::CANONICAL_ROUTE.len() {
        let (workflow, notifier) = common::workflow().await;
        let route = Route::new(Role::CANONICAL_ROUTE[..n].to_vec()).unwrap();
        let (approvers, sender) = actors_for(&workflow, &route).await;

        let letter_id = workflow
            .send_letter(sender.id, "Test", "Please approve", Some(route.clone()))
            .await
            .unwrap();

        for (i, approver) in approvers.iter().enumerate() {
            let pending = workflow
                .list_pending_for_role(approver.role.as_str())
                .await
                .unwrap();
            assert!(pending.iter().any(|p| p.letter_id == letter_id));

            let view = workflow
                .act_on_letter(
                    letter_id,
                    approver.id,
                    Action::Approve,
                    Some(&format!("ok by {}", approver.role)),
                    None,
                )
                .await
                .unwrap();

            if i + 1 < n {
                assert_eq!(view.letter.status, LetterStatus::Pending);
                assert_eq!(view.letter.current_step, i as i64 + 1);
            } else {
                assert_eq!(view.letter.status, LetterStatus::Approved);
                assert_eq!(view.letter.current_step, i as i64);
            }
        }

        let final_view = workflow.get_letter(letter_id).await.unwrap();
        assert_eq!(final_view.letter.status, LetterStatus::Approved);
        assert_eq!(final_view.total_steps, n);
        assert!(final_view
            .steps
            .iter()
            .all(|s| s.status == StepStatus::Approved && s.acted_at.is_some()));
        assert!(notifier.take().is_empty());
    }
}

#[tokio::test]
async fn test_reject_at_each_index_leaves_later_steps_untouched() {
    let route = Route::new(vec![Role::Src, Role::Faculty, Role::Hod, Role::Dean]).unwrap();

    for reject_at in 0..route.len() {
        let (workflow, notifier) = common::workflow().await;
        let (approvers, sender) = actors_for(&workflow, &route).await;
        let letter_id = workflow
            .send_letter(sender.id, "T", "B", Some(route.clone()))
            .await
            .unwrap();

        for approver in &approvers[..reject_at] {
            workflow
                .act_on_letter(letter_id, approver.id, Action::Approve, None, None)
                .await
                .unwrap();
        }

        let view = workflow
            .act_on_letter(
                letter_id,
                approvers[reject_at].id,
                Action::Reject,
                Some("no"),
                None,
            )
            .await
            .unwrap();

        assert_eq!(view.letter.status, LetterStatus::Rejected);
        assert_eq!(view.letter.current_step, reject_at as i64);
        assert_eq!(view.steps[reject_at].status, StepStatus::Rejected);
        for step in &view.steps[reject_at + 1..] {
            assert_eq!(step.status, StepStatus::Pending);
            assert!(step.actor_id.is_none());
        }

        // Nobody can decide anything until the letter is resent
        for approver in &approvers {
            for action in [Action::Approve, Action::Reject] {
                let result = workflow
                    .act_on_letter(letter_id, approver.id, action, None, None)
                    .await;
                assert!(matches!(
                    result,
                    Err(AppError::AlreadyFinalized(LetterStatus::Rejected))
                ));
            }
        }

        let notices = notifier.take();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].sender_id, sender.id);
    }
}

#[tokio::test]
async fn test_resend_restores_full_route() {
    let (workflow, _) = common::workflow().await;
    let route = Route::new(vec![Role::Src, Role::Faculty, Role::Hod]).unwrap();
    let (approvers, sender) = actors_for(&workflow, &route).await;
    let letter_id = workflow
        .send_letter(sender.id, "T", "B", Some(route))
        .await
        .unwrap();

    workflow
        .act_on_letter(letter_id, approvers[0].id, Action::Approve, Some("fine"), None)
        .await
        .unwrap();
    workflow
        .act_on_letter(letter_id, approvers[1].id, Action::Reject, Some("redo"), None)
        .await
        .unwrap();

    // Only the sender may resend
    let result = workflow
        .resend_letter(letter_id, approvers[0].id, "T2", "B2")
        .await;
    assert!(matches!(result, Err(AppError::NotAuthorized(_))));

    workflow
        .resend_letter(letter_id, sender.id, "T2", "B2")
        .await
        .unwrap();

    let view = workflow.get_letter(letter_id).await.unwrap();
    assert_eq!(view.letter.status, LetterStatus::Pending);
    assert_eq!(view.letter.current_step, 0);
    assert_eq!(view.letter.title, "T2");
    for step in &view.steps {
        assert_eq!(step.status, StepStatus::Pending);
        assert!(step.actor_id.is_none());
        assert!(step.comments.is_none());
        assert!(step.acted_at.is_none());
    }

    // Pending again, so a second resend is refused
    let result = workflow.resend_letter(letter_id, sender.id, "T3", "B3").await;
    assert!(matches!(
        result,
        Err(AppError::NotResendable(LetterStatus::Pending))
    ));

    // The route starts over from the first approver
    let view = workflow
        .act_on_letter(letter_id, approvers[0].id, Action::Approve, None, None)
        .await
        .unwrap();
    assert_eq!(view.letter.current_step, 1);
}

#[tokio::test]
async fn test_resend_of_approved_letter_is_refused() {
    let (workflow, _) = common::workflow().await;
    let route = Route::new(vec![Role::Src]).unwrap();
    let (approvers, sender) = actors_for(&workflow, &route).await;
    let letter_id = workflow
        .send_letter(sender.id, "T", "B", Some(route))
        .await
        .unwrap();
    workflow
        .act_on_letter(letter_id, approvers[0].id, Action::Approve, None, None)
        .await
        .unwrap();

    let result = workflow.resend_letter(letter_id, sender.id, "T", "B").await;
    assert!(matches!(
        result,
        Err(AppError::NotResendable(LetterStatus::Approved))
    ));
}

#[tokio::test]
async fn test_role_mismatch_is_idempotent_failure() {
    let (workflow, notifier) = common::workflow().await;
    let route = Route::new(vec![Role::Src, Role::Faculty]).unwrap();
    let (approvers, sender) = actors_for(&workflow, &route).await;
    let letter_id = workflow
        .send_letter(sender.id, "T", "B", Some(route))
        .await
        .unwrap();

    let before = workflow.get_letter_history(letter_id).await.unwrap();
    for action in [Action::Approve, Action::Reject] {
        for _ in 0..2 {
            let result = workflow
                .act_on_letter(letter_id, approvers[1].id, action, Some("x"), None)
                .await;
            assert!(matches!(result, Err(AppError::RoleMismatch { .. })));
        }
    }
    let after = workflow.get_letter_history(letter_id).await.unwrap();

    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(&after) {
        assert_eq!(b.status, a.status);
        assert_eq!(b.comments, a.comments);
        assert_eq!(b.acted_at, a.acted_at);
    }
    let view = workflow.get_letter(letter_id).await.unwrap();
    assert_eq!(view.letter.current_step, 0);
    assert!(notifier.take().is_empty());
}

#[tokio::test]
async fn test_sender_role_cannot_approve() {
    let (workflow, _) = common::workflow().await;
    let route = Route::new(vec![Role::Src]).unwrap();
    let (_, sender) = actors_for(&workflow, &route).await;
    let letter_id = workflow
        .send_letter(sender.id, "T", "B", Some(route))
        .await
        .unwrap();

    let result = workflow
        .act_on_letter(letter_id, sender.id, Action::Approve, None, None)
        .await;
    assert!(matches!(
        result,
        Err(AppError::RoleMismatch { ref actor_role, ref step_role })
            if actor_role == "Faculty Association" && step_role == "SRC"
    ));
}

#[tokio::test]
async fn test_comment_log_only_grows() {
    let (workflow, _) = common::workflow().await;
    let route = Route::new(vec![Role::Src, Role::Faculty]).unwrap();
    let (approvers, sender) = actors_for(&workflow, &route).await;
    let staff = workflow.create_actor("staff", "Staff").await.unwrap();
    let letter_id = workflow
        .send_letter(sender.id, "T", "B", Some(route))
        .await
        .unwrap();

    let mut previous = String::new();
    for (i, actor) in [&staff, &approvers[1], &sender, &approvers[0]]
        .iter()
        .enumerate()
    {
        let view = workflow
            .act_on_letter(
                letter_id,
                actor.id,
                Action::Comment,
                Some(&format!("note {}", i)),
                None,
            )
            .await
            .unwrap();

        assert_eq!(view.letter.status, LetterStatus::Pending);
        assert_eq!(view.letter.current_step, 0);
        assert_eq!(view.steps[0].status, StepStatus::Pending);

        let log = view.steps[0].comments.clone().unwrap();
        assert!(log.starts_with(&previous));
        assert!(log.len() > previous.len());
        assert!(log.ends_with(&format!(
            "{} ({}): note {}",
            actor.name, actor.role, i
        )));
        previous = log;
    }

    // Other steps are untouched
    let view = workflow.get_letter(letter_id).await.unwrap();
    assert!(view.steps[1].comments.is_none());
}

#[tokio::test]
async fn test_scenario_two_step_approval() {
    let (workflow, _) = common::workflow().await;
    let a = workflow.create_actor("A", "SRC").await.unwrap();
    let b = workflow.create_actor("B", "Faculty").await.unwrap();
    let s = workflow
        .create_actor("S", "Faculty Association")
        .await
        .unwrap();
    let route = Route::parse(&["SRC", "Faculty"]).unwrap();

    let letter = workflow
        .send_letter(s.id, "T", "B", Some(route))
        .await
        .unwrap();
    let view = workflow.get_letter(letter).await.unwrap();
    assert_eq!(view.letter.status, LetterStatus::Pending);
    assert_eq!(view.letter.current_step, 0);

    let view = workflow
        .act_on_letter(letter, a.id, Action::Approve, None, None)
        .await
        .unwrap();
    assert_eq!(view.letter.status, LetterStatus::Pending);
    assert_eq!(view.letter.current_step, 1);

    let view = workflow
        .act_on_letter(letter, b.id, Action::Approve, None, None)
        .await
        .unwrap();
    assert_eq!(view.letter.status, LetterStatus::Approved);
    assert_eq!(view.letter.current_step, 1);

    let result = workflow
        .act_on_letter(letter, b.id, Action::Approve, None, None)
        .await;
    assert!(matches!(result, Err(AppError::AlreadyFinalized(_))));
}

#[tokio::test]
async fn test_scenario_reject_and_resend() {
    let (workflow, notifier) = common::workflow().await;
    let a = workflow.create_actor("A", "SRC").await.unwrap();
    workflow.create_actor("B", "Faculty").await.unwrap();
    let s = workflow
        .create_actor("S", "Faculty Association")
        .await
        .unwrap();
    let route = Route::parse(&["SRC", "Faculty"]).unwrap();
    let letter = workflow
        .send_letter(s.id, "T", "B", Some(route))
        .await
        .unwrap();

    let view = workflow
        .act_on_letter(letter, a.id, Action::Reject, Some("missing signature"), None)
        .await
        .unwrap();
    assert_eq!(view.letter.status, LetterStatus::Rejected);
    assert_eq!(view.letter.current_step, 0);

    let notices = notifier.take();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].letter_id, letter);
    assert_eq!(notices[0].reason, "missing signature");

    workflow.resend_letter(letter, s.id, "T2", "B2").await.unwrap();
    let view = workflow.get_letter(letter).await.unwrap();
    assert_eq!(view.letter.status, LetterStatus::Pending);
    assert_eq!(view.letter.current_step, 0);
    assert!(view.steps.iter().all(|s| s.status == StepStatus::Pending));
}

#[tokio::test]
async fn test_pending_for_role_is_fifo_and_skips_finalized() {
    let (workflow, _) = common::workflow().await;
    let route = Route::new(vec![Role::Src, Role::Faculty]).unwrap();
    let (approvers, sender) = actors_for(&workflow, &route).await;

    let first = workflow
        .send_letter(sender.id, "first", "B", Some(route.clone()))
        .await
        .unwrap();
    let second = workflow
        .send_letter(sender.id, "second", "B", Some(route.clone()))
        .await
        .unwrap();
    let third = workflow
        .send_letter(sender.id, "third", "B", Some(route))
        .await
        .unwrap();

    workflow
        .act_on_letter(second, approvers[0].id, Action::Reject, None, None)
        .await
        .unwrap();

    let pending: Vec<_> = workflow
        .list_pending_for_role("SRC")
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.letter_id)
        .collect();
    assert_eq!(pending, vec![first, third]);

    let entry = &workflow.list_pending_for_role("SRC").await.unwrap()[0];
    assert_eq!(entry.title, "first");
    assert_eq!(entry.sender_name, "sender");
    assert_eq!(entry.step_index, 0);
    assert_eq!(entry.total_steps, 2);

    assert!(workflow
        .list_pending_for_role("Vice Chancellor")
        .await
        .unwrap()
        .is_empty());
    assert!(workflow
        .list_pending_for_role("Nobody")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_list_all_letters_filters_by_participation() {
    let (workflow, _) = common::workflow().await;
    let route = Route::new(vec![Role::Src, Role::Faculty]).unwrap();
    let (approvers, sender) = actors_for(&workflow, &route).await;
    let other = workflow.create_actor("other", "Staff").await.unwrap();

    let mine = workflow
        .send_letter(sender.id, "mine", "B", Some(route.clone()))
        .await
        .unwrap();
    let theirs = workflow
        .send_letter(other.id, "theirs", "B", Some(route))
        .await
        .unwrap();

    // SRC acts on both letters
    workflow
        .act_on_letter(mine, approvers[0].id, Action::Approve, None, None)
        .await
        .unwrap();
    workflow
        .act_on_letter(theirs, approvers[0].id, Action::Approve, None, None)
        .await
        .unwrap();

    let all: Vec<_> = workflow
        .list_all_letters(None)
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.id)
        .collect();
    assert_eq!(all, vec![theirs, mine]);

    let for_sender: Vec<_> = workflow
        .list_all_letters(Some(sender.id))
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.id)
        .collect();
    assert_eq!(for_sender, vec![mine]);

    let for_src: Vec<_> = workflow
        .list_all_letters(Some(approvers[0].id))
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.id)
        .collect();
    assert_eq!(for_src, vec![theirs, mine]);

    assert!(workflow
        .list_all_letters(Some(approvers[1].id))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_history_survives_finalization() {
    let (workflow, _) = common::workflow().await;
    let route = Route::new(vec![Role::Src, Role::Faculty]).unwrap();
    let (approvers, sender) = actors_for(&workflow, &route).await;
    let letter_id = workflow
        .send_letter(sender.id, "T", "B", Some(route))
        .await
        .unwrap();
    workflow
        .act_on_letter(letter_id, approvers[0].id, Action::Approve, Some("a"), None)
        .await
        .unwrap();
    workflow
        .act_on_letter(letter_id, approvers[1].id, Action::Approve, Some("b"), None)
        .await
        .unwrap();

    let history = workflow.get_letter_history(letter_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].step_index, 0);
    assert_eq!(history[0].actor_name.as_deref(), Some("u0"));
    assert_eq!(history[0].actor_role, Some(Role::Src));
    assert_eq!(history[0].comments.as_deref(), Some("a"));
    assert_eq!(history[1].role, Role::Faculty);
    assert_eq!(history[1].comments.as_deref(), Some("b"));
    assert!(history.iter().all(|h| h.acted_at.is_some()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_decisions_on_one_step() {
    let db = common::FileDb::new("race").await;
    let workflow = Workflow::new(Store::new(db.pool.clone()), Arc::new(NoopNotifier));

    let route = Route::new(vec![Role::Src]).unwrap();
    let sender = workflow
        .create_actor("S", "Faculty Association")
        .await
        .unwrap();
    let mut contenders = Vec::new();
    for i in 0..6 {
        contenders.push(workflow.create_actor(&format!("src{}", i), "SRC").await.unwrap());
    }
    let letter_id = workflow
        .send_letter(sender.id, "T", "B", Some(route))
        .await
        .unwrap();

    let handles: Vec<_> = contenders
        .iter()
        .enumerate()
        .map(|(i, actor)| {
            let workflow = workflow.clone();
            let actor_id = actor.id;
            let action = if i % 2 == 0 {
                Action::Approve
            } else {
                Action::Reject
            };
            tokio::spawn(async move {
                workflow
                    .act_on_letter(letter_id, actor_id, action, None, None)
                    .await
                    .map(|_| actor_id)
            })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(actor_id) => winners.push(actor_id),
            Err(AppError::StepAlreadyActed { .. }) | Err(AppError::AlreadyFinalized(_)) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(winners.len(), 1);
    let view = workflow.get_letter(letter_id).await.unwrap();
    assert!(view.letter.status.is_finalized());
    assert_eq!(view.steps[0].actor_id, Some(winners[0]));
}
