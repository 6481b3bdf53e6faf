use envconfig::Envconfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("kafka brokers are not configured")]
    EmptyBrokers,
    #[error("consumer group is not configured")]
    EmptyGroup,
    #[error("consumer topic is not configured")]
    EmptyTopic,
    #[error("max_records_per_poll must be positive")]
    InvalidRecordsPerPoll,
}

#[derive(Envconfig, Clone)]
pub struct KafkaConfig {
    #[envconfig(default = "20")]
    pub kafka_producer_linger_ms: u32, // Maximum time between producer batches during low traffic

    #[envconfig(default = "400")]
    pub kafka_producer_queue_mib: u32, // Size of the in-memory producer queue in mebibytes

    #[envconfig(default = "20000")]
    pub kafka_message_timeout_ms: u32, // Time before we stop retrying producing a message: 20 seconds

    #[envconfig(default = "none")]
    pub kafka_compression_codec: String, // none, gzip, snappy, lz4, zstd

    #[envconfig(default = "false")]
    pub kafka_tls: bool,

    #[envconfig(default = "localhost:9092")]
    pub kafka_hosts: String,
}

impl KafkaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kafka_hosts.trim().is_empty() {
            return Err(ConfigError::EmptyBrokers);
        }
        Ok(())
    }
}

#[derive(Envconfig, Clone)]
pub struct ConsumerConfig {
    pub kafka_consumer_group: String,
    pub kafka_consumer_topic: String,

    // We default to "earliest" for this, but if you're bringing up a new service, you probably want "latest"
    #[envconfig(default = "earliest")]
    pub kafka_consumer_offset_reset: String, // earliest, latest

    // Upper bound on the records handed out per poll cycle. This is the
    // backpressure control: one cycle never holds more than this in memory.
    #[envconfig(default = "50")]
    pub max_records_per_poll: usize,

    // How long one poll call waits for the batch to fill before handing
    // back whatever arrived.
    #[envconfig(default = "5")]
    pub poll_wait_seconds: u64,
}

impl ConsumerConfig {
    /// Because the consumer config is so application specific, we
    /// can't set good defaults in the derive macro, so we expose a way
    /// for users to set them here before init'ing their main config struct
    pub fn set_defaults(consumer_group: &str, consumer_topic: &str) {
        if std::env::var("KAFKA_CONSUMER_GROUP").is_err() {
            std::env::set_var("KAFKA_CONSUMER_GROUP", consumer_group);
        };
        if std::env::var("KAFKA_CONSUMER_TOPIC").is_err() {
            std::env::set_var("KAFKA_CONSUMER_TOPIC", consumer_topic);
        };
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kafka_consumer_group.trim().is_empty() {
            return Err(ConfigError::EmptyGroup);
        }
        if self.kafka_consumer_topic.trim().is_empty() {
            return Err(ConfigError::EmptyTopic);
        }
        if self.max_records_per_poll == 0 {
            return Err(ConfigError::InvalidRecordsPerPoll);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consumer_config() -> ConsumerConfig {
        ConsumerConfig {
            kafka_consumer_group: "courier".to_string(),
            kafka_consumer_topic: "emails_to_send".to_string(),
            kafka_consumer_offset_reset: "earliest".to_string(),
            max_records_per_poll: 50,
            poll_wait_seconds: 5,
        }
    }

    #[test]
    fn valid_consumer_config_passes() {
        assert!(consumer_config().validate().is_ok());
    }

    #[test]
    fn zero_records_per_poll_is_rejected() {
        let mut config = consumer_config();
        config.max_records_per_poll = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRecordsPerPoll)
        ));
    }

    #[test]
    fn empty_topic_is_rejected() {
        let mut config = consumer_config();
        config.kafka_consumer_topic = "".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyTopic)));
    }

    #[test]
    fn empty_brokers_are_rejected() {
        let config = KafkaConfig {
            kafka_producer_linger_ms: 20,
            kafka_producer_queue_mib: 400,
            kafka_message_timeout_ms: 20000,
            kafka_compression_codec: "none".to_string(),
            kafka_tls: false,
            kafka_hosts: " ".to_string(),
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyBrokers)));
    }
}
