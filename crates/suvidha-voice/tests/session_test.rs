//! Controller properties checked against the sans-IO state machine.

use suvidha_core::{LanguageCode, NavAction, Screen};
use suvidha_voice::{AssistantResponse, AssistantState, SessionCommand, SessionConfig, VoiceSession};
use tokio::sync::mpsc::UnboundedReceiver;

fn drain(rx: &mut UnboundedReceiver<SessionCommand>) -> Vec<SessionCommand> {
    let mut out = Vec::new();
    while let Ok(cmd) = rx.try_recv() {
        out.push(cmd);
    }
    out
}

fn chimes(commands: &[SessionCommand]) -> usize {
    commands
        .iter()
        .filter(|c| matches!(c, SessionCommand::PlayChime))
        .count()
}

#[test]
fn proactive_waits_for_first_interaction() {
    let (mut session, mut rx) = VoiceSession::new(SessionConfig::default(), Screen::Welcome, LanguageCode::Hi);

    session.on_location(Screen::Login).unwrap();
    session.on_location(Screen::Welcome).unwrap();
    session.on_location(Screen::Login).unwrap();
    assert!(drain(&mut rx).is_empty());

    session.record_interaction();
    // The interaction alone schedules nothing.
    assert!(drain(&mut rx).is_empty());

    session.on_location(Screen::Dashboard).unwrap();
    let scheduled: Vec<Screen> = drain(&mut rx)
        .into_iter()
        .filter_map(|c| match c {
            SessionCommand::ScheduleProactive { screen, .. } => Some(screen),
            _ => None,
        })
        .collect();
    assert_eq!(scheduled, [Screen::Dashboard]);
}

#[test]
fn chime_fires_once_per_login_to_dashboard_edge() {
    let (mut session, mut rx) = VoiceSession::new(SessionConfig::default(), Screen::Welcome, LanguageCode::Hi);
    session.record_interaction();

    for screen in [Screen::Login, Screen::Dashboard, Screen::Login, Screen::Dashboard] {
        session.on_location(screen).unwrap();
    }
    assert_eq!(chimes(&drain(&mut rx)), 2);
}

#[test]
fn chime_never_fires_for_other_pairs() {
    for from in Screen::ALL {
        for to in Screen::ALL {
            let (mut session, mut rx) = VoiceSession::new(SessionConfig::default(), from, LanguageCode::Hi);
            session.on_location(to).unwrap();
            let expected = usize::from(from == Screen::Login && to == Screen::Dashboard);
            assert_eq!(chimes(&drain(&mut rx)), expected, "{} -> {}", from, to);
        }
    }
}

#[test]
fn history_sent_to_guidance_is_bounded() {
    let cap = 4;
    let config = SessionConfig {
        history_cap: cap,
        ..SessionConfig::default()
    };
    let (mut session, mut rx) = VoiceSession::new(config, Screen::Dashboard, LanguageCode::Hi);

    let mut last_history = Vec::new();
    for turn in 0..cap + 5 {
        session.on_mic_pressed().unwrap();
        session.on_utterance(&format!("q{}", turn)).unwrap();
        let seq = drain(&mut rx)
            .into_iter()
            .find_map(|c| match c {
                SessionCommand::FetchAssistant { seq, history, .. } => {
                    last_history = history;
                    Some(seq)
                }
                _ => None,
            })
            .unwrap();
        session
            .on_assistant_response(seq, AssistantResponse::text(format!("a{}", turn)))
            .unwrap();
        let speech_seq = drain(&mut rx)
            .into_iter()
            .find_map(|c| match c {
                SessionCommand::Speak { seq, .. } => Some(seq),
                _ => None,
            })
            .unwrap();
        session.on_speech_finished(speech_seq);
        assert_eq!(session.state(), AssistantState::Idle);
    }

    assert!(last_history.len() <= cap);
    // Oldest first, ending with the utterance being sent.
    assert_eq!(
        last_history,
        ["Assistant: a6", "User: q7", "Assistant: a7", "User: q8"]
    );
}

#[test]
fn stale_assistant_response_is_discarded() {
    let (mut session, mut rx) = VoiceSession::new(SessionConfig::default(), Screen::Dashboard, LanguageCode::Hi);
    session.on_mic_pressed().unwrap();
    session.on_utterance("first").unwrap();
    let first = drain(&mut rx)
        .into_iter()
        .find_map(|c| match c {
            SessionCommand::FetchAssistant { seq, .. } => Some(seq),
            _ => None,
        })
        .unwrap();

    session.teardown().unwrap();
    drain(&mut rx);

    let response = AssistantResponse {
        text: "late".to_string(),
        action: Some("navigate_to_status".to_string()),
        params: None,
    };
    session.on_assistant_response(first, response).unwrap();
    let commands = drain(&mut rx);
    assert!(!commands.contains(&SessionCommand::Dispatch(NavAction::ToStatus)));
    assert!(commands.is_empty());
}

#[test]
fn teardown_cancels_timers_and_requests_reset() {
    let (mut session, mut rx) = VoiceSession::new(SessionConfig::default(), Screen::Login, LanguageCode::Hi);
    session.record_interaction();
    session.on_location(Screen::Dashboard).unwrap();
    let pending = drain(&mut rx)
        .into_iter()
        .find_map(|c| match c {
            SessionCommand::ScheduleProactive { seq, .. } => Some(seq),
            _ => None,
        })
        .unwrap();

    session.teardown().unwrap();
    let commands = drain(&mut rx);
    assert!(commands.contains(&SessionCommand::CancelProactive));
    assert!(commands.contains(&SessionCommand::ResetGuidance));
    assert!(commands.contains(&SessionCommand::ShowResponse(None)));

    // A timer that slipped through cancellation still fetches nothing.
    session.on_proactive_due(pending).unwrap();
    assert!(drain(&mut rx).is_empty());
}
