use log::debug;
use ndarray::{Array2, Array4};
use ort::{session::Session, value::Value};

use crate::error::KeypointError;
use crate::keypoints::squeeze_to_grid;
use crate::model_access::WeightsLocation;
use crate::model_processing::ConfidenceModel;
use crate::onnx_session::{create_onnx_session, ModelInfo};

/// Output holding the suppressed keypoint probabilities in SuperPoint exports.
const PROB_NMS_OUTPUT: &str = "prob_nms";

/// SuperPoint detector backed by an ONNX Runtime session.
pub struct SuperPointModel {
    session: Session,
    input_name: String,
    output_name: String,
    info: ModelInfo,
}

impl SuperPointModel {
    /// Load the model behind a validated weights location.
    pub fn load(weights: &WeightsLocation, device: &str) -> Result<Self, KeypointError> {
        let (session, info) = create_onnx_session(weights, device)?;

        let input = session.inputs.first().ok_or_else(|| KeypointError::ModelLoad {
            path: weights.model_file.clone(),
            reason: "model declares no inputs".to_string(),
        })?;
        debug!("Input: {}, type: {:?}", input.name, input.input_type);
        let input_name = input.name.clone();

        let output_name = session
            .outputs
            .iter()
            .find(|output| output.name.contains(PROB_NMS_OUTPUT))
            .or_else(|| session.outputs.first())
            .map(|output| output.name.clone())
            .ok_or_else(|| KeypointError::ModelLoad {
                path: weights.model_file.clone(),
                reason: "model declares no outputs".to_string(),
            })?;
        debug!("Reading keypoint probabilities from output '{output_name}'");

        Ok(Self {
            session,
            input_name,
            output_name,
            info,
        })
    }
}

impl ConfidenceModel for SuperPointModel {
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array2<f32>, KeypointError> {
        let input_value = Value::from_array(input.clone())
            .map_err(|e| KeypointError::Inference(format!("Failed to create input value: {e}")))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => &input_value])
            .map_err(|e| KeypointError::Inference(format!("Failed to run inference: {e}")))?;

        let output_view = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()
            .map_err(|e| {
                KeypointError::Inference(format!("Failed to extract output array: {e}"))
            })?;

        squeeze_to_grid(output_view)
    }

    fn model_info(&self) -> Option<&ModelInfo> {
        Some(&self.info)
    }
}
