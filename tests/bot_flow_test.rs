/// End-to-end vote handling through `Bot::dispatch` with recorded side effects.
use squadcall::bot::Handled;
use squadcall::models::game_session::SessionStatus;
use squadcall::voting::events::ResetCommand;
use squadcall::voting::{InboundEvent, MapStage, PollAnswerEvent};

mod common;
use common::*;

#[tokio::test]
async fn test_cycle_start_posts_and_pins_poll() {
    let bot = test_bot();
    let epoch = bot.start_cycle().await.expect("cycle");
    assert_eq!(epoch, 1);

    let sent = bot.gateway().sent();
    let Some(Sent::Poll { options, poll_id, .. }) = sent.first().cloned() else {
        panic!("first call should be the attendance poll: {sent:?}");
    };
    assert_eq!(options.len(), 5);
    assert!(sent.iter().any(|s| matches!(s, Sent::Pin { chat: CHAT, .. })));

    let snap = bot.snapshot().await;
    assert_eq!(snap.poll.map(|p| p.poll_id), Some(poll_id));
    assert_eq!(snap.session_status, Some(SessionStatus::Pending));
    assert_eq!(bot.store().sessions_created(), 1);
}

#[tokio::test]
async fn test_ten_commits_confirm_once_and_start_map_pick() {
    let (bot, poll) = started_bot().await;

    commit_all(&bot, &poll, 1..=9, SLOT_2230).await;
    assert!(!bot.snapshot().await.confirmed);
    assert_eq!(bot.gateway().messages_containing("We have quorum"), 0);

    bot.dispatch(vote(10, &poll, SLOT_2300)).await;
    let snap = bot.snapshot().await;
    assert!(snap.confirmed);
    assert_eq!(snap.committed.len(), 10);
    assert!(matches!(snap.map_stage, MapStage::AwaitingFirstChoice { .. }));

    let confirmations: Vec<String> = bot
        .gateway()
        .messages()
        .into_iter()
        .filter(|m| m.contains("We have quorum"))
        .collect();
    assert_eq!(confirmations.len(), 1);
    assert!(confirmations[0].contains("22:30"));

    // Extra players do not re-announce or start a second map pick.
    commit_all(&bot, &poll, 11..=12, SLOT_2200).await;
    assert_eq!(bot.gateway().messages_containing("We have quorum"), 1);
    assert_eq!(bot.gateway().polls().len(), 2);

    let (_, map_options) = bot.gateway().last_poll().unwrap();
    assert_eq!(map_options, bot.config().maps);

    let session = bot.store().session(1).expect("session updated");
    assert_eq!(session.status, SessionStatus::Confirmed);
    assert_eq!(session.start_time.as_deref(), Some("22:30"));
    assert_eq!(session.player_count, 10);

    let positives = bot.store().participation().iter().filter(|(_, p)| *p).count();
    assert_eq!(positives, 12);
}

#[tokio::test]
async fn test_deferred_then_slot_counts_as_one_commit() {
    let (bot, poll) = started_bot().await;

    bot.dispatch(vote(1, &poll, DEFERRED)).await;
    assert_eq!(bot.snapshot().await.deferred, vec![1]);
    assert!(bot.store().participation().is_empty());

    bot.dispatch(vote(1, &poll, SLOT_2200)).await;
    let snap = bot.snapshot().await;
    assert_eq!(snap.committed, vec![1]);
    assert!(snap.deferred.is_empty());
    assert_eq!(bot.store().participation(), vec![(1, true)]);
    assert_eq!(bot.gateway().messages_containing("1 of 10"), 1);
}

#[tokio::test]
async fn test_committed_vote_is_sticky() {
    let (bot, poll) = started_bot().await;
    bot.dispatch(vote(1, &poll, SLOT_2200)).await;

    let handled = bot.dispatch(vote(1, &poll, DECLINED)).await;
    assert_eq!(handled, Handled::Ignored);
    assert_eq!(bot.snapshot().await.committed, vec![1]);
}

#[tokio::test]
async fn test_decline_is_recorded_as_negative() {
    let (bot, poll) = started_bot().await;
    bot.dispatch(vote(4, &poll, DECLINED)).await;

    assert_eq!(bot.snapshot().await.declined, vec![4]);
    assert_eq!(bot.store().participation(), vec![(4, false)]);
}

#[tokio::test]
async fn test_quorum_lost_then_regained() {
    let (bot, poll) = started_bot().await;
    commit_all(&bot, &poll, 1..=10, SLOT_2200).await;

    bot.dispatch(retract(3, &poll)).await;
    let snap = bot.snapshot().await;
    assert!(snap.confirmed, "confirmation stays latched");
    assert_eq!(snap.committed.len(), 9);
    assert_eq!(snap.map_stage, MapStage::Idle);
    assert_eq!(bot.gateway().messages_containing("dropped below quorum"), 1);
    assert_eq!(bot.store().last_status(), Some(SessionStatus::Pending));

    bot.dispatch(vote(3, &poll, SLOT_2300)).await;
    let snap = bot.snapshot().await;
    assert_eq!(snap.committed.len(), 10);
    assert!(matches!(snap.map_stage, MapStage::AwaitingFirstChoice { .. }));
    assert_eq!(bot.gateway().messages_containing("We have quorum"), 1);
    assert_eq!(bot.store().last_status(), Some(SessionStatus::Confirmed));
    // attendance poll plus two map polls
    assert_eq!(bot.gateway().polls().len(), 3);
}

#[tokio::test]
async fn test_confirmation_after_slots_passed_uses_future_slot() {
    let bot = bot_with(test_config(), MemoryStore::new());
    let bot = bot.with_clock(late_evening);
    bot.start_cycle().await.expect("cycle");
    let poll = bot.gateway().last_poll().unwrap().0;

    commit_all(&bot, &poll, 1..=10, SLOT_2200).await;
    let confirmation = bot
        .gateway()
        .messages()
        .into_iter()
        .find(|m| m.contains("We have quorum"))
        .expect("confirmation sent");
    assert!(confirmation.contains("23:00"));
}

#[tokio::test]
async fn test_answers_for_other_polls_are_ignored() {
    let (bot, _poll) = started_bot().await;

    let handled = bot.dispatch(vote(1, "someone-elses-poll", SLOT_2200)).await;
    assert_eq!(handled, Handled::Ignored);
    assert!(bot.snapshot().await.committed.is_empty());
}

#[tokio::test]
async fn test_malformed_answers_are_dropped() {
    let (bot, poll) = started_bot().await;

    let out_of_range = bot.dispatch(vote(1, &poll, 7)).await;
    assert_eq!(out_of_range, Handled::Ignored);

    let anonymous = InboundEvent::Vote(PollAnswerEvent {
        participant: None,
        selected_option_indices: vec![SLOT_2200],
        poll_id: poll.clone(),
    });
    assert_eq!(bot.dispatch(anonymous).await, Handled::Ignored);

    let multi = InboundEvent::Vote(PollAnswerEvent {
        participant: Some(player(2)),
        selected_option_indices: vec![SLOT_2200, SLOT_2300],
        poll_id: poll,
    });
    assert_eq!(bot.dispatch(multi).await, Handled::Ignored);

    assert!(bot.snapshot().await.committed.is_empty());
}

#[tokio::test]
async fn test_votes_before_any_cycle_are_ignored() {
    let bot = test_bot();
    assert_eq!(bot.dispatch(vote(1, "poll-1", SLOT_2200)).await, Handled::Ignored);
}

#[tokio::test]
async fn test_send_failures_do_not_block_the_ledger() {
    let (bot, poll) = started_bot().await;
    bot.gateway().fail_messages(true);

    assert_eq!(bot.dispatch(vote(1, &poll, SLOT_2200)).await, Handled::Done);
    assert_eq!(bot.snapshot().await.committed, vec![1]);
    assert_eq!(bot.store().participation(), vec![(1, true)]);
}

#[tokio::test]
async fn test_store_writes_are_retried() {
    let (bot, poll) = started_bot().await;
    bot.store().fail_next(2);

    bot.dispatch(vote(1, &poll, SLOT_2200)).await;
    assert_eq!(bot.store().participation(), vec![(1, true)]);
}

#[tokio::test]
async fn test_store_outage_does_not_block_votes() {
    let (bot, poll) = started_bot().await;
    bot.store().fail_next(3);

    bot.dispatch(vote(1, &poll, SLOT_2200)).await;
    assert!(bot.store().participation().is_empty());
    assert_eq!(bot.snapshot().await.committed, vec![1]);

    bot.dispatch(vote(2, &poll, SLOT_2200)).await;
    assert_eq!(bot.store().participation(), vec![(2, true)]);
}

#[tokio::test]
async fn test_admin_reset_clears_everything() {
    let (bot, poll) = started_bot().await;
    commit_all(&bot, &poll, 1..=10, SLOT_2200).await;
    assert!(bot.snapshot().await.map_stage != MapStage::Idle);

    let intruder = InboundEvent::Reset(ResetCommand { issued_by: Some(42), chat_id: CHAT });
    assert_eq!(bot.dispatch(intruder).await, Handled::Ignored);
    assert_eq!(bot.snapshot().await.committed.len(), 10);

    let reset = InboundEvent::Reset(ResetCommand { issued_by: Some(ADMIN), chat_id: CHAT });
    assert_eq!(bot.dispatch(reset).await, Handled::Done);

    let snap = bot.snapshot().await;
    assert_eq!(snap.epoch, 2);
    assert!(snap.committed.is_empty());
    assert!(!snap.confirmed);
    assert_eq!(snap.map_stage, MapStage::Idle);
    assert_eq!(snap.poll, None);
    assert_eq!(snap.maps, None);

    // The old poll no longer counts.
    assert_eq!(bot.dispatch(vote(11, &poll, SLOT_2200)).await, Handled::Ignored);
}

#[tokio::test]
async fn test_new_cycle_starts_from_scratch() {
    let (bot, poll) = started_bot().await;
    commit_all(&bot, &poll, 1..=10, SLOT_2200).await;

    let epoch = bot.start_cycle().await.expect("second cycle");
    assert_eq!(epoch, 2);
    let new_poll = bot.gateway().last_poll().unwrap().0;
    assert_ne!(new_poll, poll);

    let snap = bot.snapshot().await;
    assert!(snap.committed.is_empty());
    assert!(!snap.confirmed);
    assert_eq!(bot.store().sessions_created(), 2);

    commit_all(&bot, &new_poll, 1..=10, SLOT_2300).await;
    assert_eq!(bot.gateway().messages_containing("We have quorum"), 2);
}

#[tokio::test]
async fn test_votes_flow_while_session_row_is_retried() {
    let bot = test_bot();
    bot.store().fail_next(1);

    let voters = async {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let started = std::time::Instant::now();
        commit_all(&bot, "poll-1", 1..=10, SLOT_2200).await;
        started.elapsed()
    };
    let (epoch, elapsed) = tokio::join!(bot.start_cycle(), voters);

    assert_eq!(epoch.expect("cycle"), 1);
    assert!(elapsed < std::time::Duration::from_millis(400), "votes waited {elapsed:?}");
    assert!(bot.snapshot().await.confirmed);

    // The confirmation made before the row existed is written once it does.
    let session = bot.store().session(1).expect("session row updated");
    assert_eq!(session.status, SessionStatus::Confirmed);
    assert_eq!(session.player_count, 10);
}
