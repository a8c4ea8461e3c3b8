use log::{ error, info };
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{ AsyncBufReadExt, BufReader };

use crate::llm::chat::ChatClient;
use crate::models::chat::Role;
use crate::models::user::UserUpdate;
use crate::render::render_message;
use crate::store::avatar::encode_avatar_file;
use crate::store::{ ConversationStore, StoreError, UserStore };

const SEND_FAILED: &str = "Erro ao enviar mensagem. Tente novamente.";

/// Starter questions offered while no conversation is open.
pub const SUGGESTIONS: [&str; 4] = [
    "Como criar uma estratégia de marketing digital?",
    "Melhores práticas para SEO em 2024",
    "Como aumentar conversões no e-commerce?",
    "Estratégias de marketing para redes sociais",
];

const HELP: &str = "Comandos:
  /new                    nova conversa
  /list                   lista as conversas
  /select <n>             abre a conversa n
  /delete <n>             apaga a conversa n
  /show                   mostra a conversa atual
  /profile <nome> [email] cria ou atualiza o perfil
  /avatar <arquivo>       define a imagem do perfil
  /logout                 remove o perfil
  /quit                   sai
Qualquer outro texto é enviado ao assistente.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    New,
    List,
    Select(usize),
    Delete(usize),
    Show,
    Profile { name: String, email: Option<String> },
    Avatar(PathBuf),
    Logout,
    Help,
    Quit,
    Send(String),
    Invalid(String),
}

pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if !line.starts_with('/') {
        return Some(Command::Send(line.to_string()));
    }

    let mut parts = line.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default().trim();
    let index = |usage: &str| {
        rest.parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| Command::Invalid(format!("uso: {}", usage)))
    };

    let command = match name {
        "/new" => Command::New,
        "/list" => Command::List,
        "/select" => index("/select <n>").map(Command::Select).unwrap_or_else(|e| e),
        "/delete" => index("/delete <n>").map(Command::Delete).unwrap_or_else(|e| e),
        "/show" => Command::Show,
        "/profile" => {
            // The last word is the e-mail when it looks like one.
            let words: Vec<&str> = rest.split_whitespace().collect();
            match words.split_last() {
                Some((last, head)) if last.contains('@') && !head.is_empty() => Command::Profile {
                    name: head.join(" "),
                    email: Some(last.to_string()),
                },
                _ => Command::Profile { name: words.join(" "), email: None },
            }
        }
        "/avatar" if !rest.is_empty() => Command::Avatar(PathBuf::from(rest)),
        "/avatar" => Command::Invalid("uso: /avatar <arquivo>".to_string()),
        "/logout" => Command::Logout,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        other => Command::Invalid(format!("comando desconhecido: {}", other)),
    };
    Some(command)
}

/// Terminal front end over the conversation and user stores.
pub struct Console {
    conversations: ConversationStore,
    users: UserStore,
    client: Arc<dyn ChatClient>,
}

impl Console {
    pub fn new(conversations: ConversationStore, users: UserStore, client: Arc<dyn ChatClient>) -> Self {
        Self { conversations, users, client }
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn users(&self) -> &UserStore {
        &self.users
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut out = std::io::stdout();
        self.greet(&mut out)?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            write!(out, "> ")?;
            out.flush()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let Some(command) = parse_command(&line) else {
                continue;
            };
            if !self.handle(command, &mut out).await? {
                break;
            }
        }
        info!("Console closed");
        Ok(())
    }

    pub fn greet<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        match self.users.user() {
            Some(user) => writeln!(out, "Olá, {} ({})!", user.name, user.initials())?,
            None => writeln!(out, "Bem-vindo ao LedChat! Use /profile <nome> para criar seu perfil.")?,
        }
        if self.conversations.active().is_none() {
            suggest(out)?;
        }
        writeln!(out, "Digite /help para ver os comandos.")
    }

    /// Executes one command. Returns `false` when the console should exit.
    pub async fn handle<W: Write + Send>(
        &mut self,
        command: Command,
        out: &mut W
    ) -> std::io::Result<bool> {
        match command {
            Command::New => {
                self.conversations.create();
                writeln!(out, "Nova conversa criada.")?;
            }
            Command::List => self.list(out)?,
            Command::Select(n) => {
                match self.id_at(n) {
                    Some(id) => {
                        if let Ok(conversation) = self.conversations.select(&id) {
                            writeln!(out, "Conversa: {}", conversation.title)?;
                        }
                        self.show(out)?;
                    }
                    None => notice(out, &format!("Conversa {} não existe.", n))?,
                }
            }
            Command::Delete(n) => {
                match self.id_at(n) {
                    Some(id) => {
                        self.conversations.delete(&id);
                        writeln!(out, "Conversa apagada.")?;
                    }
                    None => notice(out, &format!("Conversa {} não existe.", n))?,
                }
            }
            Command::Show => self.show(out)?,
            Command::Profile { name, email } => {
                // The command restates the whole profile: no e-mail means none.
                let update = UserUpdate { name: Some(name), email: Some(email), avatar: None };
                match self.users.update_user(update) {
                    Ok(user) => writeln!(out, "Perfil atualizado! ({})", user.name)?,
                    Err(e) => notice(out, &e.to_string())?,
                }
            }
            Command::Avatar(path) => {
                let result = encode_avatar_file(&path)
                    .map_err(StoreError::from)
                    .and_then(|data_url| self.users.update_avatar(&data_url));
                match result {
                    Ok(()) => writeln!(out, "Avatar atualizado!")?,
                    Err(StoreError::NoUser) => notice(out, "Crie um perfil com /profile primeiro.")?,
                    Err(e) => notice(out, &e.to_string())?,
                }
            }
            Command::Logout => {
                self.users.logout();
                writeln!(out, "Perfil removido.")?;
            }
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::Quit => {
                return Ok(false);
            }
            Command::Send(content) => self.send(&content, out).await?,
            Command::Invalid(message) => notice(out, &message)?,
        }
        Ok(true)
    }

    async fn send<W: Write + Send>(&mut self, content: &str, out: &mut W) -> std::io::Result<()> {
        let mut printed = 0;
        let mut started = false;
        let mut write_error = None;

        let result = self.conversations
            .send(self.client.as_ref(), content, |conversation| {
                let Some(last) = conversation.messages.last() else {
                    return;
                };
                if last.role != Role::Assistant || last.content.len() < printed {
                    return;
                }
                let mut write = || -> std::io::Result<()> {
                    if !started {
                        write!(out, "LedChat: ")?;
                        started = true;
                    }
                    write!(out, "{}", &last.content[printed..])?;
                    out.flush()
                };
                if let Err(e) = write() {
                    write_error.get_or_insert(e);
                }
                printed = last.content.len();
            }).await;

        if let Some(e) = write_error {
            return Err(e);
        }
        if started {
            writeln!(out)?;
        }
        if let Err(e) = result {
            match e {
                StoreError::Llm(_) => notice(out, SEND_FAILED)?,
                other => notice(out, &other.to_string())?,
            }
        }
        Ok(())
    }

    fn id_at(&self, n: usize) -> Option<String> {
        self.conversations
            .conversations()
            .get(n.checked_sub(1)?)
            .map(|c| c.id.clone())
    }

    fn list<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let conversations = self.conversations.conversations();
        if conversations.is_empty() {
            return writeln!(out, "Nenhuma conversa ainda");
        }
        for (i, conversation) in conversations.iter().enumerate() {
            let marker = if self.conversations.active_id() == Some(conversation.id.as_str()) {
                "*"
            } else {
                " "
            };
            writeln!(out, "{}{:>3}. {}", marker, i + 1, conversation.title)?;
            writeln!(out, "      {}", conversation.preview())?;
        }
        Ok(())
    }

    fn show<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        match self.conversations.active() {
            Some(conversation) => {
                for message in &conversation.messages {
                    writeln!(out, "{}\n", render_message(message))?;
                }
                Ok(())
            }
            None => {
                writeln!(out, "Nenhuma conversa selecionada. Use /new para começar.")?;
                suggest(out)
            }
        }
    }
}

fn suggest<W: Write>(out: &mut W) -> std::io::Result<()> {
    writeln!(out, "Sugestões:")?;
    for suggestion in SUGGESTIONS {
        writeln!(out, "  - {}", suggestion)?;
    }
    Ok(())
}

fn notice<W: Write>(out: &mut W, message: &str) -> std::io::Result<()> {
    error!("{}", message);
    writeln!(out, "! {}", message)
}
