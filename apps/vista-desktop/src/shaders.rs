/// WGSL shader for the lit demo cube.
pub const CUBE_SHADER: &str = r#"
struct Uniforms {
    world_view_proj: mat4x4<f32>,
    world: mat4x4<f32>,
    color: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_normal: vec3<f32>,
};

@vertex
fn vs_main(vertex: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = uniforms.world_view_proj * vec4<f32>(vertex.position, 1.0);
    out.world_normal = normalize((uniforms.world * vec4<f32>(vertex.normal, 0.0)).xyz);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let light_dir = normalize(vec3<f32>(0.3, 1.0, 0.5));
    let ambient = 0.3;
    let diffuse = max(dot(in.world_normal, light_dir), 0.0);
    let lighting = ambient + diffuse * 0.7;
    return vec4<f32>(uniforms.color.rgb * lighting, uniforms.color.a);
}
"#;
