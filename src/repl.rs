use anyhow::{Context, Result};
use crossterm::style::Stylize;
use futures::stream::{self, StreamExt};

use crate::chat::{ChatClient, ReplyStream};
use crate::events::{ConversationId, ConversationSummary};
use crate::session::Session;
use crate::streaming::{MessageBlock, present};
use crate::ui::commands::{ParsedCommand, SlashCommand, get_help_text, parse_slash_command};
use crate::ui::input::{Input, PromptReader};
use crate::ui::renderer::TerminalRenderer;

/// Whether the loop keeps going after a command
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// Interactive chat loop
pub struct Repl {
    session: Session,
    chat: ChatClient,
    stream: bool,
    input: PromptReader,
    last_prompt: Option<String>,
}

impl Repl {
    pub fn new(session: Session, chat: ChatClient, stream: bool) -> Result<Self> {
        Ok(Self {
            session,
            chat,
            stream,
            input: PromptReader::new().context("Failed to set up line editor")?,
            last_prompt: None,
        })
    }

    pub async fn run(mut self) -> Result<()> {
        print_banner(self.session.active());

        loop {
            println!();
            println!("{}", "User: ".green().bold());
            let line = match self.input.read("")? {
                Input::Line(line) => line,
                Input::Exit => break,
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if trimmed.starts_with('/') {
                match self.handle_command(trimmed).await {
                    Ok(Flow::Exit) => break,
                    Ok(Flow::Continue) => {}
                    Err(err) => eprintln!("{} {err:#}", "Error:".red()),
                }
                continue;
            }

            println!("\n{}", "HunYuanGPT: ".blue().bold());
            if let Err(err) = self.answer(trimmed).await {
                eprintln!("{} {err:#}", "Error:".red());
            }
        }

        println!("\nBye......");
        Ok(())
    }

    /// Send a prompt and show the answer as it arrives
    async fn answer(&mut self, prompt: &str) -> Result<()> {
        let before = self.session.active().clone();

        let started: crate::error::Result<ReplyStream> = if self.stream {
            self.chat
                .ask_stream(&mut self.session, prompt, None, false)
                .await
        } else {
            self.chat
                .ask(&mut self.session, prompt, None, false)
                .await
                .map(|answer| stream::iter([Ok(answer)]).boxed())
        };

        // a rollover may have happened even when the ask itself failed
        if let Some(notice) = rollover_notice(&before, self.session.active()) {
            println!("{}", notice.yellow());
        }
        let chunks = started?;
        self.last_prompt = Some(prompt.to_string());

        show(chunks).await
    }

    async fn handle_command(&mut self, input: &str) -> Result<Flow> {
        let Some(parsed) = parse_slash_command(input) else {
            let head = input.split_whitespace().next().unwrap_or(input);
            println!("Unknown command {head}. Type /help for help.");
            return Ok(Flow::Continue);
        };

        match parsed.command {
            SlashCommand::Clear => {
                println!("Are you sure to clear all conversations? (y/n)");
                let confirmed = matches!(self.input.read("")?, Input::Line(answer) if answer.trim() == "y");
                if !confirmed {
                    return Ok(Flow::Continue);
                }
            }
            SlashCommand::Draw if parsed.argument().is_some() => println!("Getting image..."),
            _ => {}
        }

        match run_command(&mut self.session, &self.chat, &parsed, self.last_prompt.as_deref()).await? {
            Reply::Notice(text) => println!("{text}"),
            Reply::Answer(answer) => {
                println!("\n{}", "HunYuanGPT: ".blue().bold());
                show(stream::iter([Ok(answer)]).boxed()).await?;
            }
            Reply::Exit => return Ok(Flow::Exit),
        }

        Ok(Flow::Continue)
    }
}

/// What the loop shows once a command has run
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    /// Status text printed as is
    Notice(String),
    /// Answer text, rendered like a streamed answer
    Answer(String),
    Exit,
}

/// Carry out a slash command against the session.
///
/// `/clear` is expected to be confirmed by the caller already. `last_prompt`
/// is what `/repeat` regenerates when it is given no prompt of its own.
pub async fn run_command(
    session: &mut Session,
    chat: &ChatClient,
    parsed: &ParsedCommand,
    last_prompt: Option<&str>,
) -> Result<Reply> {
    let notice = match parsed.command {
        SlashCommand::Help => get_help_text(),
        SlashCommand::Clear => {
            session.clear_all().await?;
            let id = session.create_conversation().await?;
            format!("All conversations cleared.\nNew conversation created, chatId: {id}.")
        }
        SlashCommand::List => format_conversations(&session.list_all().await?),
        SlashCommand::History => serde_json::to_string_pretty(&session.fetch_history(None).await?)?,
        SlashCommand::Name => {
            let name = required(parsed)?;
            session.rename(name, None).await?;
            format!("Conversation name set as {name}.")
        }
        SlashCommand::Restart => {
            session.restart().await?;
            "Conversation restarted.".to_string()
        }
        SlashCommand::New => {
            let id = session.create_conversation().await?;
            format!("New conversation created, chatId: {id}.")
        }
        SlashCommand::Change => {
            let id = ConversationId::from(required(parsed)?);
            let notice = format!("Conversation changed to {id}.");
            session.switch_to(id);
            notice
        }
        SlashCommand::Repeat => {
            let prompt = parsed.argument().or(last_prompt);
            return Ok(Reply::Answer(chat.repeat_last(session, prompt).await?));
        }
        SlashCommand::Draw => {
            let link = chat.draw_image(session, required(parsed)?).await?;
            format!("Image link: {link}")
        }
        SlashCommand::Exit => return Ok(Reply::Exit),
    };

    Ok(Reply::Notice(notice))
}

fn rollover_notice(before: &ConversationId, now: &ConversationId) -> Option<String> {
    (before != now).then(|| format!("Conversation full, continuing in new conversation {now}."))
}

/// Render an answer in a live block, closing the block even on failure
async fn show(chunks: ReplyStream) -> Result<()> {
    let mut block = MessageBlock::new(TerminalRenderer::stdout());
    let shown = present(&mut block, chunks).await;
    block.end()?;
    println!();
    shown
}

fn required(parsed: &ParsedCommand) -> Result<&str> {
    parsed.argument().with_context(|| {
        format!(
            "Missing argument. Usage: {}",
            parsed.command.usage().unwrap_or(parsed.command.command())
        )
    })
}

pub fn print_conversations(conversations: &[ConversationSummary]) {
    println!("{}", format_conversations(conversations));
}

fn format_conversations(conversations: &[ConversationSummary]) -> String {
    if conversations.is_empty() {
        return "No conversations.".to_string();
    }
    conversations
        .iter()
        .map(|c| format!("  {}  {}", c.id.to_string().cyan(), c.title))
        .collect::<Vec<_>>()
        .join("\n")
}

fn print_banner(active: &ConversationId) {
    println!("{}", format!("HunYuanGPT CLI v{}", env!("CARGO_PKG_VERSION")).magenta().bold());
    println!("Current chatId: {active}");
    println!("{}", "Type /help for help.".dark_grey());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CONVERSATION_CAPACITY;
    use crate::session::tests::{client_for, history_with};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat() -> ChatClient {
        ChatClient::new("gpt_175B_0404", "Adaptive")
    }

    async fn session(server: &MockServer, id: &str) -> Session {
        Session::start(client_for(server), Some(ConversationId::from(id)), true)
            .await
            .unwrap()
    }

    async fn run(session: &mut Session, line: &str) -> Result<Reply> {
        let parsed = parse_slash_command(line).unwrap();
        run_command(session, &chat(), &parsed, None).await
    }

    async fn mount_new_id(server: &MockServer, id: &str) {
        Mock::given(method("POST"))
            .and(path("/api/generate/id"))
            .respond_with(ResponseTemplate::new(200).set_body_string(id))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn clear_creates_the_replacement_conversation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/convs/clear"))
            .and(body_json(json!({ "chatType": 0 })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        mount_new_id(&server, "after-clear").await;

        let mut session = session(&server, "before").await;
        let reply = run(&mut session, "/clear").await.unwrap();

        assert_eq!(
            reply,
            Reply::Notice(
                "All conversations cleared.\nNew conversation created, chatId: after-clear.".into()
            )
        );
        assert_eq!(session.active().as_str(), "after-clear");
    }

    #[tokio::test]
    async fn change_switches_without_a_request() {
        let server = MockServer::start().await;
        let mut session = session(&server, "a").await;

        let reply = run(&mut session, "/change b").await.unwrap();

        assert_eq!(reply, Reply::Notice("Conversation changed to b.".into()));
        assert_eq!(session.active().as_str(), "b");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn new_makes_the_created_conversation_active() {
        let server = MockServer::start().await;
        mount_new_id(&server, "n2").await;
        let mut session = session(&server, "n1").await;

        let reply = run(&mut session, "/new").await.unwrap();

        assert_eq!(reply, Reply::Notice("New conversation created, chatId: n2.".into()));
        assert_eq!(session.active().as_str(), "n2");
    }

    #[tokio::test]
    async fn name_sends_the_whole_rest_of_the_line() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/conv/title/c1"))
            .and(body_json(json!({ "title": "Weekend  trip" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let mut session = session(&server, "c1").await;

        let reply = run(&mut session, "/name Weekend  trip").await.unwrap();
        assert_eq!(reply, Reply::Notice("Conversation name set as Weekend  trip.".into()));
    }

    #[tokio::test]
    async fn failed_command_leaves_the_session_usable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/conv/title/c1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_new_id(&server, "c2").await;
        let mut session = session(&server, "c1").await;

        let err = run(&mut session, "/name x").await.unwrap_err();
        assert!(err.to_string().contains("set conversation name failed"));
        assert_eq!(session.active().as_str(), "c1");

        let reply = run(&mut session, "/new").await.unwrap();
        assert_eq!(reply, Reply::Notice("New conversation created, chatId: c2.".into()));
    }

    #[tokio::test]
    async fn missing_argument_fails_before_any_request() {
        let server = MockServer::start().await;
        let mut session = session(&server, "c1").await;

        let err = run(&mut session, "/draw").await.unwrap_err();
        assert!(err.to_string().contains("/draw <description>"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeat_falls_back_to_the_last_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat/repeat/c1"))
            .and(body_json(json!({
                "model": "gpt_175B_0404",
                "prompt": "earlier question",
                "plugin": "Adaptive",
                "isSkipHistory": false,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "a\nb\nc\n\ndata: {\"type\":\"text\",\"msg\":\"again\"}\ndata: [plugin: ]",
            ))
            .expect(1)
            .mount(&server)
            .await;
        let mut session = session(&server, "c1").await;

        let parsed = parse_slash_command("/repeat").unwrap();
        let reply = run_command(&mut session, &chat(), &parsed, Some("earlier question"))
            .await
            .unwrap();
        assert_eq!(reply, Reply::Answer("again".into()));
    }

    #[tokio::test]
    async fn exit_and_help_need_no_server() {
        let server = MockServer::start().await;
        let mut session = session(&server, "c1").await;

        assert_eq!(run(&mut session, "/quit").await.unwrap(), Reply::Exit);
        match run(&mut session, "/help").await.unwrap() {
            Reply::Notice(text) => assert!(text.contains("/change")),
            other => panic!("expected help text, got {other:?}"),
        }
    }

    #[test]
    fn rollover_notice_only_when_the_id_changed() {
        let old = ConversationId::from("old");
        assert_eq!(rollover_notice(&old, &old), None);
        assert_eq!(
            rollover_notice(&old, &ConversationId::from("new")),
            Some("Conversation full, continuing in new conversation new.".to_string())
        );
    }

    #[tokio::test]
    async fn rollover_is_visible_even_when_the_ask_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/conv/full"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(history_with(CONVERSATION_CAPACITY)),
            )
            .mount(&server)
            .await;
        mount_new_id(&server, "fresh").await;
        Mock::given(method("POST"))
            .and(path("/api/chat/fresh"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let mut session = session(&server, "full").await;
        let before = session.active().clone();
        assert!(chat().ask(&mut session, "hi", None, false).await.is_err());

        assert!(rollover_notice(&before, session.active()).is_some());
    }

    #[test]
    fn empty_listing_says_so() {
        assert_eq!(format_conversations(&[]), "No conversations.");
    }

    #[test]
    fn missing_argument_names_the_usage() {
        let parsed = parse_slash_command("/change").unwrap();
        let err = required(&parsed).unwrap_err();
        assert!(err.to_string().contains("/change <chat id>"));

        let parsed = parse_slash_command("/change abc").unwrap();
        assert_eq!(required(&parsed).unwrap(), "abc");
    }
}
