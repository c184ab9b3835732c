use std::sync::Arc;

use log::{error, info};
use signal_room::{
    AnonymousIdentity, ClientConfig, IdentityProvider, LocalRoomView, MemoryStore, RoomSession,
    SessionError, Status, UserIdentity, SIGNAL_PALETTE,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

type Input = Lines<BufReader<Stdin>>;

async fn prompt(input: &mut Input, question: &str) -> Option<String> {
    println!("{question}");
    match input.next_line().await {
        Ok(line) => line,
        Err(e) => {
            error!("Failed to read input: {}", e);
            None
        }
    }
}

async fn ask_identity(
    input: &mut Input,
    user_id: &str,
    preset: Option<String>,
) -> Option<UserIdentity> {
    if let Some(nickname) = preset {
        return UserIdentity::new(user_id, &nickname).ok();
    }
    loop {
        let nickname = prompt(input, "Pick a trader ID (2-15 characters):").await?;
        match UserIdentity::new(user_id, &nickname) {
            Ok(identity) => return Some(identity),
            Err(e) => println!("{e}"),
        }
    }
}

// First eight characters of a message id, as shown on screen.
fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

fn render(view: &LocalRoomView, me: &str) {
    println!("---");
    let mut users: Vec<_> = view.users.values().collect();
    users.sort_by(|a, b| a.nickname.cmp(&b.nickname));
    for user in users {
        println!("{} {}", user.status.indicator(), user.nickname);
    }
    for message in &view.messages {
        let mine = if message.is_authored_by(me) { "*" } else { " " };
        let edited = if message.edited { " (edited)" } else { "" };
        println!(
            "{mine} [{}] {}: {}{edited}",
            short_id(&message.id),
            message.user_nickname,
            message.text
        );
    }
}

// Returns false once the user leaves.
async fn handle_line(session: &mut RoomSession, line: &str) -> Result<bool, SessionError> {
    let line = line.trim();
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    match command {
        "/leave" => return Ok(false),
        "/palette" => println!("{}", SIGNAL_PALETTE.join(" ")),
        "/status" => match rest.parse::<Status>() {
            Ok(status) => session.set_status(status).await?,
            Err(e) => println!("{e}"),
        },
        "/nick" => session.set_nickname(rest).await?,
        "/delete" => {
            let id = find_message(session, rest).await;
            session.delete(&id).await?;
        }
        "/edit" => {
            let (prefix, text) = rest.split_once(' ').unwrap_or((rest, ""));
            let id = find_message(session, prefix).await;
            session.edit(&id, text).await?;
        }
        _ => {
            session.send(line).await?;
        }
    }
    Ok(true)
}

// Lets the user type the short id shown on screen. Only their own messages match.
async fn find_message(session: &RoomSession, prefix: &str) -> String {
    let me = session.identity().user_id.clone();
    session
        .messages()
        .await
        .into_iter()
        .find(|m| m.is_authored_by(&me) && m.id.starts_with(prefix))
        .map_or_else(|| prefix.to_string(), |m| m.id)
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ClientConfig::from_env();
    let store = Arc::new(MemoryStore::new());
    let identity_provider = AnonymousIdentity::new();
    let user_id = match identity_provider.get_or_create_anonymous_user().await {
        Ok(user_id) => user_id,
        Err(e) => {
            error!("Failed to get a user id: {}", e);
            std::process::exit(1);
        }
    };

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let Some(identity) = ask_identity(&mut input, &user_id, config.nickname.clone()).await else {
        return;
    };

    let room_code = match &config.room_code {
        Some(code) => code.to_string(),
        None => match prompt(&mut input, "Room code:").await {
            Some(code) => code,
            None => return,
        },
    };

    let joined =
        RoomSession::join_with_status(store, &room_code, identity, config.initial_status).await;
    let mut session = match joined {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to join {}: {}", room_code, e);
            std::process::exit(1);
        }
    };
    info!("Joined {} - signals only", session.room());

    let mut updates = session.updates();
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                render(&session.view().await, &user_id);
            }
            line = input.next_line() => {
                let Ok(Some(line)) = line else { break };
                match handle_line(&mut session, &line).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => println!("{e}"),
                }
            }
        }
    }

    session.leave().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_counts_characters() {
        assert_eq!(short_id("0f8c2a1e-77b4-4c1d"), "0f8c2a1e");
        assert_eq!(short_id("ж🚀ж🚀ж🚀ж🚀ж🚀"), "ж🚀ж🚀ж🚀ж🚀");
        assert_eq!(short_id("abc"), "abc");
    }
}
