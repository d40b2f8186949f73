//! AWS adapters: S3 for archives, DynamoDB for video records.

pub mod dynamodb;
pub mod s3;
