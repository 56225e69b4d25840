// ==========================================
// 配方版本与成本核算系统 - 导入配置读取接口
// ==========================================
// 用途: 促升引擎通过该 trait 读取暂存相关配置
// 好处: 引擎层不直接依赖 ConfigManager，便于测试替换
// ==========================================

use async_trait::async_trait;
use std::error::Error;

#[async_trait]
pub trait StagingConfigReader: Send + Sync {
    /// 暂存行保留天数（超期自动清理）
    async fn get_staging_retention_days(&self) -> Result<i64, Box<dyn Error>>;

    /// 批次状态预览的样本行数
    async fn get_staging_sample_rows(&self) -> Result<usize, Box<dyn Error>>;

    /// 核算默认币种标签
    async fn get_default_currency(&self) -> Result<String, Box<dyn Error>>;
}
