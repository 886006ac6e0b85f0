//! ComfyUIノードの伝播ルール・対象ノード・カテゴリ定義
//!
//! すべて静的データ。実行時に生成・変更されることはない。
//! テーブル内の宣言順は優先順位を表すため、並べ替えないこと。

/// ノードの `class_type` 判定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassMatcher {
    Exact(&'static str),
    AnyOf(&'static [&'static str]),
}

impl ClassMatcher {
    pub fn matches(&self, class_type: &str) -> bool {
        match self {
            ClassMatcher::Exact(name) => *name == class_type,
            ClassMatcher::AnyOf(names) => names.contains(&class_type),
        }
    }

    fn is_exact(&self) -> bool {
        matches!(self, ClassMatcher::Exact(_))
    }
}

/// 出力スロットの解決方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingTarget {
    /// 同じノードの入力をたどる（バイパス）
    FollowInput(&'static str),
    /// 複数の入力を解決してテンプレートへ埋め込む
    Format {
        template: &'static str,
        inputs: &'static [&'static str],
    },
}

/// 伝播ルール: ノード種別 → (出力スロット → 解決方法)
#[derive(Debug, Clone, Copy)]
pub struct PropagationRule {
    pub class_type: ClassMatcher,
    pub mapping: &'static [(u64, MappingTarget)],
}

impl PropagationRule {
    pub fn target(&self, slot: u64) -> Option<&MappingTarget> {
        self.mapping
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, target)| target)
    }
}

/// 解析対象ノード（サンプラーなど）と解決する入力名
#[derive(Debug, Clone, Copy)]
pub struct TargetSpec {
    pub class_type: ClassMatcher,
    pub inputs: &'static [&'static str],
}

/// 出力カテゴリ: 表示名とフォーマット
#[derive(Debug, Clone, Copy)]
pub struct CategoryFormat {
    pub key: &'static str,
    pub label: &'static str,
    pub templates: &'static [&'static str],
}

/// `class_type` を持つルール
pub trait Matchable {
    fn matcher(&self) -> &ClassMatcher;
}

impl Matchable for PropagationRule {
    fn matcher(&self) -> &ClassMatcher {
        &self.class_type
    }
}

impl Matchable for TargetSpec {
    fn matcher(&self) -> &ClassMatcher {
        &self.class_type
    }
}

/// ノード種別に一致するルールを探す
///
/// 完全一致を先に、次に集合一致を宣言順で調べる。
pub fn find_rule<'a, T: Matchable>(rules: &'a [T], class_type: &str) -> Option<&'a T> {
    rules
        .iter()
        .find(|rule| rule.matcher().is_exact() && rule.matcher().matches(class_type))
        .or_else(|| {
            rules
                .iter()
                .find(|rule| !rule.matcher().is_exact() && rule.matcher().matches(class_type))
        })
}

use MappingTarget::{FollowInput, Format};

pub static PROPAGATION_RULES: &[PropagationRule] = &[
    PropagationRule {
        class_type: ClassMatcher::Exact("TagSeparator"),
        mapping: &[(0, FollowInput("pos_prompt")), (1, FollowInput("neg_prompt"))],
    },
    PropagationRule {
        class_type: ClassMatcher::AnyOf(&[
            "ModelSamplingWaifuDiffusionV",
            "Mahiro",
            "ModelSamplingFlux",
            "IPAdapterUnifiedLoader",
            "IPAdapterAdvanced",
            "IPAdapter",
            "ApplyFluxIPAdapter",
            "ApplyAdvancedFluxIPAdapter",
        ]),
        mapping: &[(0, FollowInput("model"))],
    },
    PropagationRule {
        class_type: ClassMatcher::AnyOf(&["ModelMergeSimple", "ModelMergeAdd", "ModelMergeSubstract"]),
        mapping: &[(
            0,
            Format {
                template: "{model1} [+] {model2}",
                inputs: &["model1", "model2"],
            },
        )],
    },
    PropagationRule {
        class_type: ClassMatcher::AnyOf(&["CheckpointLoaderSimple", "Checkpoint Loader"]),
        mapping: &[(0, FollowInput("ckpt_name"))],
    },
    PropagationRule {
        class_type: ClassMatcher::AnyOf(&["UnetLoaderGGUF", "UNETLoader", "UnetLoaderGGUFAdvanced"]),
        mapping: &[(0, FollowInput("unet_name"))],
    },
    PropagationRule {
        class_type: ClassMatcher::Exact("CLIPTextEncode"),
        mapping: &[(0, FollowInput("text")), (1, FollowInput("clip"))],
    },
    PropagationRule {
        class_type: ClassMatcher::Exact("Seed"),
        mapping: &[(0, FollowInput("seed"))],
    },
    PropagationRule {
        class_type: ClassMatcher::Exact("KSampler"),
        mapping: &[(0, FollowInput("latent_image"))],
    },
    PropagationRule {
        class_type: ClassMatcher::Exact("VAEEncode"),
        mapping: &[(0, FollowInput("pixels"))],
    },
    PropagationRule {
        class_type: ClassMatcher::Exact("LatentBlend"),
        mapping: &[(0, FollowInput("samples1"))],
    },
    PropagationRule {
        class_type: ClassMatcher::Exact("VAEDecode"),
        mapping: &[(0, FollowInput("samples"))],
    },
    PropagationRule {
        class_type: ClassMatcher::Exact("ImageBlend"),
        mapping: &[(0, FollowInput("image1"))],
    },
    PropagationRule {
        class_type: ClassMatcher::AnyOf(&["ImageScaleBy", "ImageUpscaleWithModel"]),
        mapping: &[(0, FollowInput("image"))],
    },
    PropagationRule {
        class_type: ClassMatcher::Exact("EmptyLatentImage"),
        mapping: &[(
            0,
            Format {
                template: "{width} x {height}",
                inputs: &["width", "height"],
            },
        )],
    },
    PropagationRule {
        class_type: ClassMatcher::Exact("LoraLoader"),
        mapping: &[(
            0,
            Format {
                template: "{model}\n+ LoRA: <{lora_name}:{strength_model}>",
                inputs: &["model", "lora_name", "strength_model"],
            },
        )],
    },
];

pub static TARGET_SPECS: &[TargetSpec] = &[
    TargetSpec {
        class_type: ClassMatcher::AnyOf(&["KSampler", "KSampler (WAS)"]),
        inputs: &[
            "model",
            "positive",
            "negative",
            "latent_image",
            "sampler_name",
            "scheduler",
            "cfg",
            "steps",
            "seed",
        ],
    },
    TargetSpec {
        class_type: ClassMatcher::AnyOf(&["KSamplerAdvanced"]),
        inputs: &[
            "model",
            "positive",
            "negative",
            "latent_image",
            "sampler_name",
            "scheduler",
            "cfg",
            "steps",
            "noise_seed",
        ],
    },
];

pub static CATEGORY_FORMATS: &[CategoryFormat] = &[
    CategoryFormat {
        key: "models",
        label: "Model",
        templates: &["{model}"],
    },
    CategoryFormat {
        key: "pos_prompts",
        label: "Prompt",
        templates: &["{positive}"],
    },
    CategoryFormat {
        key: "neg_prompts",
        label: "Negative Prompt",
        templates: &["{negative}"],
    },
    CategoryFormat {
        key: "img_gen_sizes",
        label: "Size",
        templates: &["{latent_image}"],
    },
    CategoryFormat {
        key: "sampler_configs",
        label: "Sampler Config",
        templates: &["{sampler_name} @ {scheduler} @ cfg: {cfg:.2f} @ {steps} steps"],
    },
    CategoryFormat {
        key: "seeds",
        label: "Seed",
        templates: &["{seed}", "{noise_seed}"],
    },
];
