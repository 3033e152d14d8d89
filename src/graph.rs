//! Knowledge graph access through Neo4j
//!
//! Entities are `:Entity` nodes carrying a `name` and a precomputed
//! `embedding` list. Similarity is computed server-side in Cypher.

use async_trait::async_trait;
use neo4rs::{query, Graph, Row};
use tracing::{debug, info, warn};

use crate::config::SimilarityFunction;
use crate::orchestrator::{EntityIndex, EntityMatch};
use crate::Result;

/// Graph store backed by Neo4j
pub struct GraphStore {
    graph: Graph,
    similarity: SimilarityFunction,
}

impl GraphStore {
    /// Connect to Neo4j server
    pub async fn connect(
        uri: &str,
        user: &str,
        password: &str,
        similarity: SimilarityFunction,
    ) -> Result<Self> {
        let graph = Graph::new(uri, user, password).await?;
        info!(%uri, %similarity, "Connected to Neo4j");

        Ok(Self { graph, similarity })
    }

    /// Round-trip a trivial query
    pub async fn ping(&self) -> Result<()> {
        let mut result = self.graph.execute(query("RETURN 1 AS ok")).await?;
        while result.next().await?.is_some() {}
        Ok(())
    }

    /// Number of entities that carry an embedding
    pub async fn entity_count(&self) -> Result<i64> {
        let mut result = self
            .graph
            .execute(query(
                "MATCH (e:Entity) WHERE e.embedding IS NOT NULL RETURN count(e) AS total",
            ))
            .await?;

        let mut total = 0;
        if let Some(row) = result.next().await? {
            total = row.get::<i64>("total").unwrap_or(0);
        }
        Ok(total)
    }

    /// Entities most similar to `vector`, best first
    pub async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<EntityMatch>> {
        let embedding: Vec<f64> = vector.iter().map(|v| f64::from(*v)).collect();

        let q = query(&similarity_cypher(self.similarity))
            .param("query_embedding", embedding)
            .param("limit", limit as i64);

        let mut result = self.graph.execute(q).await?;
        let mut matches = Vec::new();

        while let Some(row) = result.next().await? {
            matches.extend(entity_from_row(&row));
        }

        debug!("Similarity search returned {} entities", matches.len());
        Ok(matches)
    }
}

#[async_trait]
impl EntityIndex for GraphStore {
    async fn similarity_search(&self, vector: &[f32], limit: usize) -> Result<Vec<EntityMatch>> {
        self.search(vector, limit).await
    }
}

/// Decode one result row. Rows without a name or a numeric score are skipped.
fn entity_from_row(row: &Row) -> Option<EntityMatch> {
    let name = match row.get::<String>("name") {
        Ok(name) => name,
        Err(err) => {
            warn!("Skipping entity without a name: {}", err);
            return None;
        }
    };

    match row.get::<f64>("score") {
        Ok(score) if !score.is_nan() => Some(EntityMatch { name, score }),
        _ => {
            debug!(%name, "Skipping entity without a score");
            None
        }
    }
}

/// Top-k cosine query. Entities without a comparable embedding are skipped;
/// ties are ordered by name.
pub fn similarity_cypher(function: SimilarityFunction) -> String {
    format!(
        "MATCH (e:Entity)
         WHERE e.embedding IS NOT NULL AND size(e.embedding) = size($query_embedding)
         WITH e, {}(e.embedding, $query_embedding) AS score
         WHERE score IS NOT NULL
         RETURN e.name AS name, score
         ORDER BY score DESC, name ASC
         LIMIT $limit",
        function.cypher_name()
    )
}

#[cfg(test)]
mod tests {
    use neo4rs::{BoltList, BoltType};

    use super::*;

    fn row(name: impl Into<BoltType>, score: impl Into<BoltType>) -> Row {
        Row::new(
            BoltList::from(vec![BoltType::from("name"), BoltType::from("score")]),
            BoltList::from(vec![name.into(), score.into()]),
        )
    }

    #[test]
    fn named_row_becomes_entity_match() {
        let entity = entity_from_row(&row("Millet", 0.91_f64)).unwrap();
        assert_eq!(entity, EntityMatch::new("Millet", 0.91));
    }

    #[test]
    fn row_with_null_name_is_skipped() {
        assert!(entity_from_row(&row(None::<String>, 0.91_f64)).is_none());
    }

    #[test]
    fn row_without_name_column_is_skipped() {
        let row = Row::new(
            BoltList::from(vec![BoltType::from("score")]),
            BoltList::from(vec![BoltType::from(0.5_f64)]),
        );
        assert!(entity_from_row(&row).is_none());
    }

    #[test]
    fn row_with_null_or_nan_score_is_skipped() {
        assert!(entity_from_row(&row("Millet", None::<f64>)).is_none());
        assert!(entity_from_row(&row("Millet", f64::NAN)).is_none());
    }

    #[test]
    fn gds_query_uses_gds_cosine() {
        let cypher = similarity_cypher(SimilarityFunction::Gds);
        assert!(cypher.contains("gds.similarity.cosine(e.embedding, $query_embedding)"));
        assert!(!cypher.contains("vector.similarity"));
    }

    #[test]
    fn native_query_uses_vector_cosine() {
        let cypher = similarity_cypher(SimilarityFunction::Native);
        assert!(cypher.contains("vector.similarity.cosine(e.embedding, $query_embedding)"));
    }

    #[test]
    fn query_orders_by_score_then_name_and_limits() {
        let cypher = similarity_cypher(SimilarityFunction::Gds);
        assert!(cypher.contains("MATCH (e:Entity)"));
        assert!(cypher.contains("ORDER BY score DESC, name ASC"));
        assert!(cypher.contains("LIMIT $limit"));
        assert!(cypher.contains("RETURN e.name AS name, score"));
    }

    #[test]
    fn query_skips_incomparable_embeddings() {
        let cypher = similarity_cypher(SimilarityFunction::Gds);
        assert!(cypher.contains("e.embedding IS NOT NULL"));
        assert!(cypher.contains("size(e.embedding) = size($query_embedding)"));
        assert!(cypher.contains("WHERE score IS NOT NULL"));
    }

    #[tokio::test]
    #[ignore] // Requires a running Neo4j with GDS and seeded :Entity nodes
    async fn live_search_respects_limit() {
        let store = GraphStore::connect(
            "bolt://localhost:7687",
            "neo4j",
            "llm12345",
            SimilarityFunction::Gds,
        )
        .await
        .unwrap();

        store.ping().await.unwrap();
        let count = store.entity_count().await.unwrap();
        let matches = store.search(&[0.1; 768], 3).await.unwrap();

        assert!(matches.len() <= 3);
        assert!(matches.len() as i64 <= count);
        assert!(matches.windows(2).all(|w| w[0].score >= w[1].score));
    }
}
