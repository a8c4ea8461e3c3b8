use serde::Deserialize;
use std::fs;
use std::sync::Arc;
use log::info;
use thiserror::Error;

const DEFAULT_SYSTEM_PROMPT: &str = "Você é o LedChat, um assistente de IA especializado em marketing digital. Você é expert em:

- Estratégias de marketing digital
- SEO e SEM
- Redes sociais e social media
- Email marketing
- Marketing de conteúdo
- Análise de dados e métricas
- Publicidade online (Google Ads, Facebook Ads, etc.)
- Growth hacking
- Marketing de influenciadores
- E-commerce e conversão
- Branding e posicionamento
- Marketing automation

Sempre forneça respostas práticas, acionáveis e baseadas em melhores práticas atuais do mercado. Seja direto, útil e mantenha um tom profissional mas acessível. Quando apropriado, sugira ferramentas específicas, métricas para acompanhar e exemplos práticos.

Se a pergunta não for relacionada a marketing digital, responda de forma educada mas redirecione para tópicos de marketing sempre que possível.";

const DEFAULT_TITLE_PROMPT: &str = "Gere um título curto e descritivo (máximo 4 palavras) para uma conversa que começou com a seguinte mensagem. Responda apenas com o título, sem aspas ou formatação adicional.";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt file IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Prompt JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Prompt '{0}' is empty")]
    Empty(&'static str),
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PromptConfig {
    pub system_prompt: String,
    pub title_prompt: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            title_prompt: DEFAULT_TITLE_PROMPT.to_string(),
        }
    }
}

impl PromptConfig {
    fn validate(&self) -> Result<(), PromptError> {
        if self.system_prompt.trim().is_empty() {
            return Err(PromptError::Empty("system_prompt"));
        }
        if self.title_prompt.trim().is_empty() {
            return Err(PromptError::Empty("title_prompt"));
        }
        Ok(())
    }
}

pub fn load_prompts_from_str(json: &str) -> Result<PromptConfig, PromptError> {
    let config: PromptConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

/// Built-in prompts, overridden field by field by the JSON file at `path`.
pub fn load_prompts(path: Option<&str>) -> Result<Arc<PromptConfig>, PromptError> {
    match path {
        Some(path) => {
            info!("Loading prompts from {}", path);
            let file_content = fs::read_to_string(path)?;
            Ok(Arc::new(load_prompts_from_str(&file_content)?))
        }
        None => Ok(Arc::new(PromptConfig::default())),
    }
}
