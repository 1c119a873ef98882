//! Ground-truth-map stage: wraps [`crate::groundtruth::GroundTruthMapper`]
//! as a `StageRunner`.

use async_trait::async_trait;

use crate::error::Result;
use crate::groundtruth::GroundTruthMapper;

use super::{ChapterResult, StageContext, StageName, StageOutcome, StageRunner};

/// Builds the ground-truth `SystemStructureMap` and persists it.
pub struct GroundTruthMapRunner;

#[async_trait]
impl StageRunner for GroundTruthMapRunner {
    fn name(&self) -> StageName {
        StageName::GroundTruthMap
    }

    fn prerequisites(&self) -> &'static [StageName] {
        &[]
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageOutcome> {
        let mapper = GroundTruthMapper::new(ctx.store.clone(), ctx.finder.clone(), ctx.llm.clone());
        let (map, findings) = mapper.build().await?;

        let key = ctx.config.artifact_key("system_structure_map.json");
        crate::objectstore::write_json(&*ctx.store, &key, &map).await?;

        Ok(StageOutcome {
            result: ChapterResult {
                stage: self.name(),
                content: serde_json::to_value(&map)?,
            },
            findings,
        })
    }
}
