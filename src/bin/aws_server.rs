//! AWS server binary.
//!
//! Same HTTP surface as the local server, with archives in S3 and records in
//! DynamoDB.
//!
//! Environment Variables:
//! - AWS_REGION: AWS region (e.g., us-east-1)
//! - S3_BUCKET: S3 bucket for archives
//! - DYNAMODB_TABLE: DynamoDB table for video records
//! - DYNAMODB_OWNER_INDEX: GSI on `owner_id` (default `owner_index`)

use framezip::adapters::aws::{dynamodb::DynamoRepository, s3::S3Store};
use framezip::config::AwsConfig;
use framezip::server::{self, BoxError};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = server::bootstrap();
    let aws = AwsConfig::from_env()?;

    let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let store = S3Store::new(aws_sdk_s3::Client::new(&sdk_config), aws.s3_bucket.clone());
    let repo = DynamoRepository::new(
        aws_sdk_dynamodb::Client::new(&sdk_config),
        aws.dynamodb_table.clone(),
        aws.owner_index.clone(),
    );

    info!(bucket = %aws.s3_bucket, table = %aws.dynamodb_table, "using aws adapters");
    server::run(&config, repo, store).await
}
