use crate::client::AwsCloud;
use crate::error::{AwsError, Result};
use aws_sdk_ssm::types::ParameterType;
use seedflow_infra::Parameter;

const RECOMMENDED_ECS_AMI: &str = "/aws/service/ecs/optimized-ami/amazon-linux-2/recommended/image_id";

impl AwsCloud {
    pub(crate) async fn recommended_ami(&self) -> Result<String> {
        let out = self
            .ssm
            .get_parameter()
            .name(RECOMMENDED_ECS_AMI)
            .send()
            .await
            .map_err(|e| AwsError::sdk("GetParameter", e))?;

        out.parameter()
            .and_then(|p| p.value())
            .map(str::to_string)
            .ok_or_else(|| Self::missing("GetParameter", "Parameter.Value"))
    }

    pub(crate) async fn parameters_by_path(&self, path: &str) -> Result<Vec<Parameter>> {
        let mut parameters = Vec::new();
        let mut next_token = None;
        loop {
            let out = self
                .ssm
                .get_parameters_by_path()
                .path(path)
                .with_decryption(false)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| AwsError::sdk("GetParametersByPath", e))?;

            for p in out.parameters() {
                if let (Some(name), Some(arn)) = (p.name(), p.arn()) {
                    parameters.push(Parameter {
                        name: name.to_string(),
                        arn: arn.to_string(),
                    });
                }
            }

            next_token = out.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(parameters)
    }

    pub(crate) async fn store_parameter(&self, name: &str, value: &str, secure: bool) -> Result<()> {
        let kind = if secure {
            ParameterType::SecureString
        } else {
            ParameterType::String
        };
        self.ssm
            .put_parameter()
            .name(name)
            .value(value)
            .r#type(kind)
            .overwrite(true)
            .send()
            .await
            .map_err(|e| AwsError::sdk("PutParameter", e))?;
        tracing::info!(parameter = name, "Stored parameter");
        Ok(())
    }

    pub(crate) async fn remove_parameter(&self, name: &str) -> Result<()> {
        self.ssm
            .delete_parameter()
            .name(name)
            .send()
            .await
            .map_err(|e| AwsError::sdk("DeleteParameter", e))?;
        tracing::info!(parameter = name, "Deleted parameter");
        Ok(())
    }
}
