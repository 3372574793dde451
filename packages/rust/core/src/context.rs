//! Knowledge context builder.
//!
//! Every stored document is wrapped in file delimiters and the blocks are
//! joined verbatim. There is no chunking or truncation: the blob grows
//! linearly with the knowledge base and is resent on every question.

use tracing::{debug, instrument};

use kbchat_shared::{KnowledgeDocument, Result};
use kbchat_storage::Storage;

/// Separator placed between document blocks.
const BLOCK_SEPARATOR: &str = "\n\n";

/// Fetch all documents (ordered by file name) and render them into one blob.
///
/// Returns `None` when the knowledge base is empty.
#[instrument(skip_all)]
pub async fn build_context(storage: &Storage) -> Result<Option<String>> {
    let documents = storage.list_documents().await?;
    let context = render_context(&documents);

    if let Some(blob) = &context {
        debug!(
            documents = documents.len(),
            bytes = blob.len(),
            "built knowledge context"
        );
    }

    Ok(context)
}

/// Render documents, in the order given, into the delimited context blob.
pub fn render_context(documents: &[KnowledgeDocument]) -> Option<String> {
    if documents.is_empty() {
        return None;
    }

    let blocks: Vec<String> = documents
        .iter()
        .map(|doc| document_block(&doc.file_name, &doc.content))
        .collect();

    Some(blocks.join(BLOCK_SEPARATOR))
}

/// One delimited document block.
pub fn document_block(file_name: &str, content: &str) -> String {
    format!(
        "--- START OF FILE: {file_name} ---\n\n{content}\n\n--- END OF FILE: {file_name} ---"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("kbchat_ctx_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn doc(name: &str, content: &str) -> KnowledgeDocument {
        KnowledgeDocument {
            id: Uuid::now_v7().to_string(),
            file_name: name.into(),
            content: content.into(),
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn empty_renders_none() {
        assert!(render_context(&[]).is_none());
    }

    #[test]
    fn single_block_format() {
        let ctx = render_context(&[doc("a.md", "# Info\nHours: 9-6")]).unwrap();
        assert_eq!(
            ctx,
            "--- START OF FILE: a.md ---\n\n# Info\nHours: 9-6\n\n--- END OF FILE: a.md ---"
        );
    }

    #[test]
    fn blocks_joined_by_blank_line() {
        let ctx = render_context(&[doc("a.md", "A"), doc("b.md", "B")]).unwrap();
        assert!(ctx.contains("--- END OF FILE: a.md ---\n\n--- START OF FILE: b.md ---"));
    }

    #[test]
    fn content_is_not_truncated() {
        let big = "x".repeat(200_000);
        let ctx = render_context(&[doc("big.md", &big)]).unwrap();
        assert!(ctx.contains(&big));
    }

    #[tokio::test]
    async fn empty_store_builds_none() {
        let storage = test_storage().await;
        assert!(build_context(&storage).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn output_sorted_regardless_of_insertion_order() {
        let names = ["c.md", "a.md", "b.md"];
        let orders: [[usize; 3]; 3] = [[0, 1, 2], [2, 1, 0], [1, 2, 0]];

        let mut outputs = Vec::new();
        for order in orders {
            let storage = test_storage().await;
            for i in order {
                storage
                    .insert_document(names[i], &format!("content of {}", names[i]), Utc::now())
                    .await
                    .unwrap();
            }
            let ctx = build_context(&storage).await.unwrap().unwrap();

            let a = ctx.find("START OF FILE: a.md").unwrap();
            let b = ctx.find("START OF FILE: b.md").unwrap();
            let c = ctx.find("START OF FILE: c.md").unwrap();
            assert!(a < b && b < c, "documents out of order: {ctx}");
            outputs.push(ctx);
        }

        assert!(outputs.windows(2).all(|w| w[0] == w[1]));
    }
}
