//! LLM-based discipline classification for publications.
//!
//! Each publication's title and abstract go through the same prompt template
//! and the model's reply is stored verbatim as the label. Nothing here checks
//! the reply's format; parsing and clean-up happen in the tidy stage.

use std::time::Instant;

use anyhow::Context;
use scholartag_core::{ClassifiedPublication, Publication};
use tracing::{debug, info};

use crate::ollama::TextGenerator;
use crate::prompt::build_prompt;

/// Classifier bound to one generator and one model name.
pub struct Classifier<G> {
    generator: G,
    model: String,
}

/// Summary of a classification batch.
pub struct ClassifyStats {
    pub total: usize,
    pub elapsed_secs: f64,
}

impl<G: TextGenerator> Classifier<G> {
    pub fn new(generator: G, model: impl Into<String>) -> Self {
        Self {
            generator,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Raw label string for a single publication.
    pub async fn classify(&self, publication: &Publication) -> anyhow::Result<String> {
        let prompt = build_prompt(&publication.title, &publication.r#abstract);
        let label = self
            .generator
            .generate(&self.model, &prompt)
            .await
            .with_context(|| format!("classifying {}", publication.id))?;
        debug!(id = %publication.id, label = %label, "classified");
        Ok(label)
    }

    /// Classify every publication in order, one request at a time.
    ///
    /// The first inference error aborts the batch.
    pub async fn classify_all(
        &self,
        publications: &[Publication],
    ) -> anyhow::Result<(Vec<ClassifiedPublication>, ClassifyStats)> {
        let start = Instant::now();
        let total = publications.len();
        info!(model = %self.model, total, "classifying publications");

        let mut classified = Vec::with_capacity(total);
        for (i, publication) in publications.iter().enumerate() {
            let label = self.classify(publication).await?;
            classified.push(ClassifiedPublication {
                publication: publication.clone(),
                label: Some(label),
            });
            eprint!(
                "\r  Classified {}/{total} ({:.1}%)",
                i + 1,
                (i + 1) as f64 / total as f64 * 100.0
            );
        }
        if total > 0 {
            eprintln!();
        }

        let stats = ClassifyStats {
            total,
            elapsed_secs: start.elapsed().as_secs_f64(),
        };
        info!(total, elapsed_secs = stats.elapsed_secs, "classification complete");
        Ok((classified, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ollama::InferenceError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies from a fixed list and records every prompt it was sent.
    struct ScriptedGenerator {
        replies: Mutex<Vec<Result<String, u16>>>,
        prompts: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<Result<&str, u16>>) -> Self {
            let mut replies: Vec<Result<String, u16>> =
                replies.into_iter().map(|r| r.map(str::to_string)).collect();
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, model: &str, prompt: &str) -> Result<String, InferenceError> {
            self.prompts
                .lock()
                .unwrap()
                .push((model.to_string(), prompt.to_string()));
            match self.replies.lock().unwrap().pop() {
                Some(Ok(text)) => Ok(text),
                Some(Err(status)) => Err(InferenceError::Server {
                    status,
                    body: "model crashed".into(),
                }),
                None => panic!("no scripted reply left"),
            }
        }
    }

    fn publication(id: &str, title: &str) -> Publication {
        Publication {
            id: id.into(),
            title: title.into(),
            r#abstract: format!("Abstract of {title}."),
        }
    }

    #[tokio::test]
    async fn one_result_per_publication_in_order() {
        let generator = ScriptedGenerator::new(vec![Ok("psychiatry|nursing"), Ok("NA"), Ok("")]);
        let classifier = Classifier::new(generator, "llama3.1:8b");
        let pubs = vec![
            publication("p1", "A"),
            publication("p2", "B"),
            publication("p3", "C"),
        ];

        let (results, stats) = classifier.classify_all(&pubs).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].publication, pubs[0]);
        assert_eq!(results[0].label.as_deref(), Some("psychiatry|nursing"));
        assert_eq!(results[1].label.as_deref(), Some("NA"));
        assert_eq!(results[2].label.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn labels_are_stored_verbatim() {
        let generator = ScriptedGenerator::new(vec![Ok("  Psychiatry | MHC\n")]);
        let classifier = Classifier::new(generator, "m");

        let label = classifier.classify(&publication("p1", "A")).await.unwrap();
        assert_eq!(label, "  Psychiatry | MHC\n");
    }

    #[tokio::test]
    async fn prompts_carry_model_title_and_abstract() {
        let generator = ScriptedGenerator::new(vec![Ok("x")]);
        let classifier = Classifier::new(generator, "llama3.1:8b");
        classifier.classify(&publication("p1", "Crisis care")).await.unwrap();

        let prompts = classifier.generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].0, "llama3.1:8b");
        assert!(prompts[0].1.contains("Title: Crisis care"));
        assert!(prompts[0].1.contains("Abstract of Crisis care."));
    }

    #[tokio::test]
    async fn inference_error_aborts_batch() {
        let generator = ScriptedGenerator::new(vec![Ok("a"), Err(500)]);
        let classifier = Classifier::new(generator, "m");
        let pubs = vec![
            publication("p1", "A"),
            publication("p2", "B"),
            publication("p3", "C"),
        ];

        let err = classifier.classify_all(&pubs).await.err().unwrap();
        assert!(err.to_string().contains("p2"), "unexpected error: {err}");
        // Nothing after the failure was attempted.
        assert_eq!(classifier.generator.prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_batch() {
        let classifier = Classifier::new(ScriptedGenerator::new(vec![]), "m");
        let (results, stats) = classifier.classify_all(&[]).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(stats.total, 0);
    }
}
