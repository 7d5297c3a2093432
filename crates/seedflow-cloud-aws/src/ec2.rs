use crate::client::AwsCloud;
use crate::error::{AwsError, Result};
use aws_sdk_ec2::types::SummaryStatus;
use seedflow_infra::KeyPair;
use std::time::Duration;

impl AwsCloud {
    pub(crate) async fn new_key_pair(&self, name: &str) -> Result<KeyPair> {
        let out = self
            .ec2
            .create_key_pair()
            .key_name(name)
            .send()
            .await
            .map_err(|e| AwsError::sdk("CreateKeyPair", e))?;

        Ok(KeyPair {
            name: out.key_name().unwrap_or(name).to_string(),
            fingerprint: out
                .key_fingerprint()
                .ok_or_else(|| Self::missing("CreateKeyPair", "KeyFingerprint"))?
                .to_string(),
            material: out
                .key_material()
                .ok_or_else(|| Self::missing("CreateKeyPair", "KeyMaterial"))?
                .to_string(),
        })
    }

    /// Waits until both instance and system status checks report `ok`
    pub(crate) async fn poll_instance_status(
        &self,
        instance_id: &str,
        delay: Duration,
        max_attempts: u32,
    ) -> Result<()> {
        for attempt in 1..=max_attempts {
            let out = self
                .ec2
                .describe_instance_status()
                .instance_ids(instance_id)
                .send()
                .await
                .map_err(|e| AwsError::sdk("DescribeInstanceStatus", e))?;

            let ok = out.instance_statuses().iter().any(|s| {
                let instance = s.instance_status().and_then(|st| st.status());
                let system = s.system_status().and_then(|st| st.status());
                instance == Some(&SummaryStatus::Ok) && system == Some(&SummaryStatus::Ok)
            });
            if ok {
                tracing::info!(instance_id, attempt, "Instance status ok");
                return Ok(());
            }

            tracing::debug!(instance_id, attempt, max_attempts, "Instance not ready yet");
            tokio::time::sleep(delay).await;
        }

        Err(AwsError::InstanceNotReady {
            instance_id: instance_id.to_string(),
            attempts: max_attempts,
        })
    }
}
