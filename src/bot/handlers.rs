//! Message routing and command dispatch.
//!
//! One inbound text message resolves to exactly one outbound reply.
//! Priority order: credential lookup, pending-command pop, cancel
//! keyword, armed command execution, command keyword, free-form chat.

use std::sync::Arc;

use tracing::{info, warn};

use crate::bot::commands::{self, Command};
use crate::bot::composer::{self, Chip, Outbound};
use crate::bot::error::BotError;
use crate::bot::memory::ConversationMemory;
use crate::bot::sessions::SessionRegistry;
use crate::bot::state::{CommandState, PendingCommand};
use crate::fetch::{self, website, youtube, ContentFetcher};
use crate::line::events::Inbound;
use crate::llm::{CompletionProvider, Role};
use crate::utils;

/// Command reference shown by `/help`.
pub const HELP_TEXT: &str = "説明：
/token
👉API Tokenは、https://platform.openai.com/ に登録することで取得できます。

/system
👉 要約が得意な人になってもらうなど、ある役割をロボットに命令することができます

/reset
👉 システムプロンプトを初期設定に戻します。

/clear
👉 現在、それぞれのケースで過去2回の履歴が記録されていますが、このコマンドは履歴情報をクリアするものです。

/image
👉 DALL∙E 2 モデルを使ってテキストから画像を生成します。

/url
👉 Web ページや YouTube 動画のリンク先を要約します。

/menu
👉 よく使うコマンドを表示します。

/cancel
👉 入力待ちのコマンドを取り消します。

その他のテキスト入力
👉 ChatGPTに文字を入力";

/// Confirmation after a token is validated and stored.
pub const MSG_TOKEN_ENABLED: &str = "Token Enabled.";

/// Confirmation after the system prompt is replaced.
pub const MSG_SYSTEM_SET: &str = "システムプロンプトを入力しました。";

/// Confirmation after the system prompt is reset to the default.
pub const MSG_SYSTEM_RESET: &str = "システムプロンプトを初期設定に戻しました。";

/// Confirmation after the history is cleared.
pub const MSG_HISTORY_CLEARED: &str = "履歴のクリアに成功しました。";

/// Acknowledgement of the cancel keyword.
pub const MSG_CANCELLED: &str = "コマンドをキャンセルしました。";

/// Body of the `/menu` reply.
pub const MSG_MENU: &str = "ご用件を選んでください。";

/// Reply to message kinds the bot cannot process.
pub const MSG_UNSUPPORTED: &str =
    "このメッセージ形式には対応していません。テキストを送信してください。";

/// Prompt sent after `/token` arms token registration.
pub const PROMPT_TOKEN: &str = "OpenAI API Token を入力してください。";

/// Prompt sent after `/system` arms prompt replacement.
pub const PROMPT_SYSTEM: &str = "新しいシステムプロンプトを入力してください。";

/// Prompt sent after `/image` arms image generation.
pub const PROMPT_IMAGE: &str = "生成したい画像の説明を入力してください。";

/// Prompt sent after `/url` arms summarization.
pub const PROMPT_URL: &str =
    "要約したい Web ページまたは YouTube 動画の URL を入力してください。";

/// Reply when the summarize flow receives something that is not a URL.
pub const MSG_URL_NOT_FOUND: &str =
    "URL が見つかりませんでした。https:// から始まる URL を入力してください。";

const STRUCTURED_TEMPLATE: &str = "以下のメッセージに日本語で答えてください。回答は必ず JSON オブジェクトのみで返すこと。キー \"reply\" に回答本文を入れ、ユーザーが続けて送りそうな返信があれば \"reply sample1\" から \"reply sample4\" のキーに短い返信例を入れてください。";

fn structured_prompt(text: &str) -> String {
    format!("{STRUCTURED_TEMPLATE}\n\nメッセージ:\n{text}")
}

fn menu_chips() -> Vec<Chip> {
    vec![
        Chip::labeled("画像生成", "/image"),
        Chip::labeled("URL 要約", "/url"),
        Chip::labeled("プロンプト設定", "/system"),
        Chip::labeled("ヘルプ", "/help"),
    ]
}

/// Per-user dispatch over conversation memory, pending-command state
/// and the provider client registry.
pub struct SessionRouter {
    memory: Arc<ConversationMemory>,
    commands: Arc<CommandState>,
    sessions: SessionRegistry,
    fetcher: Arc<dyn ContentFetcher>,
    model_engine: String,
}

impl SessionRouter {
    /// Wires the router to its collaborators.
    #[must_use]
    pub fn new(
        memory: Arc<ConversationMemory>,
        commands: Arc<CommandState>,
        sessions: SessionRegistry,
        fetcher: Arc<dyn ContentFetcher>,
        model_engine: String,
    ) -> Self {
        Self {
            memory,
            commands,
            sessions,
            fetcher,
            model_engine,
        }
    }

    /// Handles a classified webhook event. Returns the reply token and
    /// payload to send, or `None` when the event needs no reply.
    pub async fn handle_inbound(&self, inbound: Inbound) -> Option<(String, Outbound)> {
        match inbound {
            Inbound::Text {
                user_id,
                reply_token,
                text,
            } => {
                let reply = self.handle_text(&user_id, &text).await;
                Some((reply_token, reply))
            }
            Inbound::Unsupported {
                user_id,
                reply_token,
                kind,
            } => {
                info!("{user_id}: unsupported {kind} message");
                Some((reply_token, composer::text(MSG_UNSUPPORTED)))
            }
            Inbound::Ignored => None,
        }
    }

    /// Routes one text message to exactly one reply. Failures map to
    /// their user-facing message here, clearing memory where the error
    /// taxonomy demands it.
    pub async fn handle_text(&self, user_id: &str, text: &str) -> Outbound {
        let text = text.trim();
        info!("{user_id}: {text}");

        match self.route(user_id, text).await {
            Ok(outbound) => outbound,
            Err(e) => {
                warn!("Handling failed for {user_id}: {e}");
                if e.clears_memory() {
                    self.memory.remove(user_id);
                }
                composer::text(&e.user_message())
            }
        }
    }

    async fn route(&self, user_id: &str, text: &str) -> Result<Outbound, BotError> {
        let client = self.sessions.get_or_init(user_id).await?;
        let pending = self.commands.pop(user_id);

        // Cancel wins over whatever was armed; the pop above already
        // cleared the flag.
        if text == commands::CANCEL_KEYWORD {
            return Ok(composer::text(MSG_CANCELLED));
        }

        match pending {
            PendingCommand::AwaitingToken => self.register_token(user_id, text).await,
            PendingCommand::AwaitingSystemPrompt => Ok(self.set_system_prompt(user_id, text)),
            PendingCommand::AwaitingImagePrompt => {
                self.generate_image(user_id, text, &client).await
            }
            PendingCommand::AwaitingSummarizeUrl => {
                self.summarize_url(user_id, text, &client).await
            }
            PendingCommand::None => match Command::parse(text) {
                Some(command) => Ok(self.run_command(user_id, command)),
                None => self.chat(user_id, text, &client).await,
            },
        }
    }

    fn run_command(&self, user_id: &str, command: Command) -> Outbound {
        match command {
            Command::Help => composer::text(HELP_TEXT),
            Command::ShowMenu => composer::text_with(MSG_MENU, menu_chips()),
            Command::RegisterToken => {
                self.arm_with_prompt(user_id, PendingCommand::AwaitingToken, PROMPT_TOKEN)
            }
            Command::SetSystemPrompt => {
                self.arm_with_prompt(user_id, PendingCommand::AwaitingSystemPrompt, PROMPT_SYSTEM)
            }
            Command::GenerateImage => {
                self.arm_with_prompt(user_id, PendingCommand::AwaitingImagePrompt, PROMPT_IMAGE)
            }
            Command::SummarizeUrl => {
                self.arm_with_prompt(user_id, PendingCommand::AwaitingSummarizeUrl, PROMPT_URL)
            }
            Command::ResetSystemPrompt => {
                self.memory.reset_system_message(user_id);
                composer::text(MSG_SYSTEM_RESET)
            }
            Command::ClearHistory => {
                self.memory.remove(user_id);
                composer::text(MSG_HISTORY_CLEARED)
            }
            Command::Cancel => composer::text(MSG_CANCELLED),
        }
    }

    fn arm_with_prompt(&self, user_id: &str, command: PendingCommand, prompt: &str) -> Outbound {
        self.commands.arm(user_id, command);
        composer::text_with(
            prompt,
            vec![Chip::labeled("キャンセル", commands::CANCEL_KEYWORD)],
        )
    }

    async fn register_token(&self, user_id: &str, token: &str) -> Result<Outbound, BotError> {
        self.sessions.setup_token(user_id, token).await?;
        Ok(composer::text(MSG_TOKEN_ENABLED))
    }

    fn set_system_prompt(&self, user_id: &str, prompt: &str) -> Outbound {
        self.memory.change_system_message(user_id, prompt);
        composer::text(MSG_SYSTEM_SET)
    }

    async fn generate_image(
        &self,
        user_id: &str,
        prompt: &str,
        client: &Arc<dyn CompletionProvider>,
    ) -> Result<Outbound, BotError> {
        self.memory.append(user_id, Role::User, prompt);
        let url = client.image_generation(prompt).await?;
        self.memory.append(user_id, Role::Assistant, url.as_str());
        Ok(composer::image(
            &url,
            vec![
                Chip::labeled("もう一枚", "/image"),
                Chip::labeled("履歴をクリア", "/clear"),
            ],
        ))
    }

    async fn summarize_url(
        &self,
        user_id: &str,
        text: &str,
        client: &Arc<dyn CompletionProvider>,
    ) -> Result<Outbound, BotError> {
        let Some(url) = self.fetcher.resolve_url(text) else {
            return Ok(composer::text(MSG_URL_NOT_FOUND));
        };

        let request = if let Some(id) = self.fetcher.video_id(&url) {
            let chunks = self.fetcher.fetch_transcript(&id).await?;
            if chunks.is_empty() {
                return Err(BotError::EmptyContent);
            }
            youtube::summary_request(&fetch::join_and_clip(&chunks, fetch::CONTENT_CHAR_LIMIT))
        } else {
            let chunks = self.fetcher.fetch_page(&url).await?;
            if chunks.is_empty() {
                return Err(BotError::EmptyContent);
            }
            website::summary_request(&fetch::join_and_clip(&chunks, fetch::CONTENT_CHAR_LIMIT))
        };

        let answer = client.chat_completion(&request, &self.model_engine).await?;
        self.memory.append(user_id, Role::Assistant, answer.as_str());
        Ok(composer::text(&answer))
    }

    async fn chat(
        &self,
        user_id: &str,
        text: &str,
        client: &Arc<dyn CompletionProvider>,
    ) -> Result<Outbound, BotError> {
        self.memory.append(user_id, Role::User, text);

        // Memory keeps the raw text; only the outgoing copy of the
        // final turn carries the structured-output instruction.
        let mut context = self.memory.get(user_id);
        if let Some(last) = context.last_mut() {
            last.content = structured_prompt(text);
        }

        let raw = client.chat_completion(&context, &self.model_engine).await?;
        let parsed = utils::extract_structured_reply(&raw);
        self.memory
            .append(user_id, Role::Assistant, parsed.reply.as_str());
        Ok(composer::text_with_chips(&parsed.reply, &parsed.samples))
    }
}
